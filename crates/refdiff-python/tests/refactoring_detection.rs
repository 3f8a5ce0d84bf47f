// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! End-to-end refactoring detection over Python sources.
//!
//! Each test builds a before and an after revision from inline sources,
//! diffs them and checks the exact record set.

mod support;

use refdiff_core::model::Visibility;
use refdiff_core::refactoring::{Refactoring, RefactoringKind};
use support::{descriptions, diff_sources, model_from};

// ============================================================================
// Fixtures
// ============================================================================

const CALCULATOR: &str = r#"
class Calculator:
    def __init__(self):
        self.total = 0

    def sum(self, x, y):
        self.total = x + y
        return self.total

    def difference(self, x, y):
        self.total = x - y
        return self.total
"#;

const ADVANCED_CALCULATOR: &str = r#"
class AdvancedCalculator:
    def __init__(self):
        self.total = 0

    def sum(self, x, y):
        self.total = x + y
        return self.total

    def difference(self, x, y):
        self.total = x - y
        return self.total
"#;

const UTILS: &str = r#"
class Utils:
    def format_name(self, first, last):
        return first.strip() + " " + last.strip()

    def initials(self, first, last):
        return first[0] + last[0]
"#;

const APP: &str = r#"
class App:
    def run(self, args):
        for arg in args:
            print(arg)
        return 0
"#;

// ============================================================================
// Identity
// ============================================================================

mod identity {
    use super::*;

    #[test]
    fn diffing_a_revision_against_itself_is_empty() {
        let files = [
            ("calc.py", CALCULATOR),
            ("app.py", APP),
            ("helper.py", UTILS),
        ];
        let result = diff_sources(&files, &files);
        assert!(result.is_empty(), "unexpected: {:?}", descriptions(&result));
        assert!(result.added_types().is_empty());
        assert!(result.removed_types().is_empty());
        assert!(result.added_operations().is_empty());
        assert!(result.removed_operations().is_empty());
    }

    #[test]
    fn empty_revisions() {
        let result = diff_sources(&[], &[]);
        assert!(result.is_empty());
    }
}

// ============================================================================
// Classes
// ============================================================================

mod classes {
    use super::*;

    #[test]
    fn rename_class_in_same_file() {
        let result = diff_sources(
            &[("calc.py", CALCULATOR)],
            &[("calc.py", ADVANCED_CALCULATOR)],
        );
        assert_eq!(
            result.refactorings(),
            &[Refactoring::RenameClass {
                before: refdiff_core::refactoring::TypeDescriptor {
                    qualified_name: "calc.Calculator".to_string(),
                    name: "Calculator".to_string(),
                    file: "calc.py".to_string(),
                },
                after: refdiff_core::refactoring::TypeDescriptor {
                    qualified_name: "calc.AdvancedCalculator".to_string(),
                    name: "AdvancedCalculator".to_string(),
                    file: "calc.py".to_string(),
                },
            }]
        );
        assert!(result.added_types().is_empty());
        assert!(result.removed_types().is_empty());
    }

    #[test]
    fn move_class_between_files() {
        let result = diff_sources(
            &[("helper.py", UTILS), ("app.py", APP)],
            &[("common.py", UTILS), ("app.py", APP)],
        );
        assert_eq!(result.len(), 1, "records: {:?}", descriptions(&result));
        let Refactoring::MoveClass { before, after } = &result.refactorings()[0] else {
            panic!("expected a move, got {:?}", descriptions(&result));
        };
        assert_eq!(before.qualified_name, "helper.Utils");
        assert_eq!(after.qualified_name, "common.Utils");
        // Module containers never surface as added or removed types.
        assert!(result.added_types().is_empty());
        assert!(result.removed_types().is_empty());
    }

    #[test]
    fn move_and_rename_class() {
        let renamed = UTILS.replace("class Utils", "class NameTools");
        let result = diff_sources(&[("helper.py", UTILS)], &[("tools.py", renamed.as_str())]);
        assert_eq!(result.len(), 1, "records: {:?}", descriptions(&result));
        assert_eq!(
            result.refactorings()[0].kind(),
            RefactoringKind::MoveAndRenameClass
        );
    }

    #[test]
    fn unrelated_new_class_is_only_added() {
        let logger = format!(
            "{CALCULATOR}\nclass Logger:\n    def log(self, message):\n        print(message)\n"
        );
        let result = diff_sources(&[("calc.py", CALCULATOR)], &[("calc.py", logger.as_str())]);
        assert!(result.is_empty(), "unexpected: {:?}", descriptions(&result));
        let added: Vec<&str> = result
            .added_types()
            .iter()
            .map(|t| t.qualified_name.as_str())
            .collect();
        assert_eq!(added, vec!["calc.Logger"]);
        assert_eq!(result.for_type("calc.Logger").count(), 0);
    }

    #[test]
    fn class_becomes_abstract() {
        let before = "class Shape:\n    def area(self):\n        return 0\n";
        let after = r#"from abc import ABC

class Shape(ABC):
    def area(self):
        return 0
"#;
        let result = diff_sources(&[("shapes.py", before)], &[("shapes.py", after)]);
        assert_eq!(
            result.of_kind(RefactoringKind::AddClassModifier).count(),
            1,
            "records: {:?}",
            descriptions(&result)
        );
    }
}

// ============================================================================
// Operations
// ============================================================================

mod operations {
    use super::*;

    const SERVICE: &str = r#"
class Service:
    def public_method(self, request):
        payload = self.decode(request)
        if payload is None:
            return None
        return self.handle(payload)
"#;

    #[test]
    fn private_rename_is_deterministic() {
        let after_source = SERVICE.replace("def public_method", "def __public_method");
        let before = model_from(&[("service.py", SERVICE)]);
        let after = model_from(&[("service.py", after_source.as_str())]);

        let first = refdiff_core::diff(&before, &after).unwrap();
        let second = refdiff_core::diff(&before, &after).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        let renames: Vec<&Refactoring> = first.of_kind(RefactoringKind::RenameOperation).collect();
        assert_eq!(renames.len(), 1, "records: {:?}", descriptions(&first));
        let Refactoring::RenameOperation { before, after } = renames[0] else {
            unreachable!();
        };
        assert_eq!(before.name, "public_method");
        assert_eq!(after.name, "__public_method");

        let visibility: Vec<&Refactoring> = first
            .of_kind(RefactoringKind::ChangeOperationVisibility)
            .collect();
        assert_eq!(visibility.len(), 1);
        assert_eq!(
            visibility[0].visibility_change(),
            Some((Visibility::Public, Visibility::Private))
        );
    }

    #[test]
    fn free_function_moves_between_modules() {
        let slugify = "def slugify(text):\n    return text.lower().replace(\" \", \"-\")\n";
        let result = diff_sources(&[("utils.py", slugify)], &[("text.py", slugify)]);
        assert_eq!(result.len(), 1, "records: {:?}", descriptions(&result));
        let Refactoring::MoveOperation { before, after } = &result.refactorings()[0] else {
            panic!("expected a move, got {:?}", descriptions(&result));
        };
        assert_eq!(before.container, "utils");
        assert_eq!(after.container, "text");
    }

    #[test]
    fn renamed_parameter() {
        let before = r#"class Box:
    def resize(self, width, height):
        return width * height
"#;
        let after = "class Box:\n    def resize(self, w, height):\n        return w * height\n";
        let result = diff_sources(&[("box.py", before)], &[("box.py", after)]);
        assert_eq!(result.len(), 1, "records: {:?}", descriptions(&result));
        let Refactoring::RenameParameter { from, to, .. } = &result.refactorings()[0] else {
            panic!(
                "expected a parameter rename, got {:?}",
                descriptions(&result)
            );
        };
        assert_eq!(from, "width");
        assert_eq!(to, "w");
    }

    #[test]
    fn added_static_modifier() {
        let before = "class Math:\n    def double(self, x):\n        return x * 2\n";
        let after = "class Math:\n    @staticmethod\n    def double(x):\n        return x * 2\n";
        let result = diff_sources(&[("m.py", before)], &[("m.py", after)]);
        let kinds: Vec<RefactoringKind> = result.refactorings().iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, vec![RefactoringKind::AddOperationModifier]);
    }

    #[test]
    fn getter_of_another_attribute_is_not_a_rename() {
        let before = r#"class Person:
    def __init__(self, name, age):
        self.name = name
        self.age = age

    def get_name(self):
        return self.name
"#;
        let after = r#"class Person:
    def __init__(self, name, age):
        self.name = name
        self.age = age

    def get_age(self):
        return self.age
"#;
        let result = diff_sources(&[("m.py", before)], &[("m.py", after)]);
        assert!(result.is_empty(), "records: {:?}", descriptions(&result));
        assert_eq!(result.removed_operations().len(), 1);
        assert_eq!(result.removed_operations()[0].name, "get_name");
        assert_eq!(result.added_operations().len(), 1);
        assert_eq!(result.added_operations()[0].name, "get_age");
    }
}

// ============================================================================
// Extract and Inline
// ============================================================================

mod extract_inline {
    use super::*;

    const REPORT_INLINE: &str = r#"
class Report:
    def render(self, rows):
        lines = []
        for row in rows:
            lines.append(row.strip().upper())
        header = "REPORT"
        return header + "\n".join(lines)
"#;

    const REPORT_EXTRACTED: &str = r#"
class Report:
    def render(self, rows):
        header = "REPORT"
        return header + "\n".join(self.format_rows(rows))

    def format_rows(self, rows):
        lines = []
        for row in rows:
            lines.append(row.strip().upper())
        return lines
"#;

    #[test]
    fn extract_operation_in_same_class() {
        let result = diff_sources(
            &[("report.py", REPORT_INLINE)],
            &[("report.py", REPORT_EXTRACTED)],
        );
        assert_eq!(result.len(), 1, "records: {:?}", descriptions(&result));
        let Refactoring::ExtractOperation {
            source_before,
            extracted,
            ..
        } = &result.refactorings()[0]
        else {
            panic!("expected an extract, got {:?}", descriptions(&result));
        };
        assert_eq!(source_before.name, "render");
        assert_eq!(extracted.name, "format_rows");
    }

    #[test]
    fn inline_operation_into_single_caller() {
        let result = diff_sources(
            &[("report.py", REPORT_EXTRACTED)],
            &[("report.py", REPORT_INLINE)],
        );
        assert_eq!(result.len(), 1, "records: {:?}", descriptions(&result));
        let Refactoring::InlineOperation {
            inlined,
            target_after,
            ..
        } = &result.refactorings()[0]
        else {
            panic!("expected an inline, got {:?}", descriptions(&result));
        };
        assert_eq!(inlined.name, "format_rows");
        assert_eq!(target_after.name, "render");
    }

    #[test]
    fn extract_and_move_yields_both_records() {
        let before = r#"
class A:
    def compute(self, values):
        total = 0
        for v in values:
            if v > 0:
                total += v * 2
        return total

class B:
    def describe(self):
        return "B"
"#;
        let after = r#"
class A:
    def compute(self, values):
        return B.compute(values)

class B:
    def describe(self):
        return "B"

    @staticmethod
    def compute(values):
        total = 0
        for v in values:
            if v > 0:
                total += v * 2
        return total
"#;
        let result = diff_sources(&[("calc.py", before)], &[("calc.py", after)]);
        assert_eq!(result.len(), 2, "records: {:?}", descriptions(&result));

        let extract: Vec<&Refactoring> = result
            .of_kind(RefactoringKind::ExtractAndMoveOperation)
            .collect();
        assert_eq!(extract.len(), 1);
        let Refactoring::ExtractAndMoveOperation { extracted, .. } = extract[0] else {
            unreachable!();
        };
        assert_eq!(extracted.container, "calc.B");
        assert_eq!(extracted.name, "compute");

        let moves: Vec<&Refactoring> = result.of_kind(RefactoringKind::MoveOperation).collect();
        assert_eq!(moves.len(), 1);
        let Refactoring::MoveOperation { before, after } = moves[0] else {
            unreachable!();
        };
        assert_eq!(before.qualified_name(), "calc.A.compute");
        assert_eq!(after.qualified_name(), "calc.B.compute");
    }
}

// ============================================================================
// Hierarchy
// ============================================================================

mod hierarchy {
    use super::*;

    #[test]
    fn pull_up_from_one_of_two_subclasses() {
        let before = r#"
class Animal:
    def __init__(self, name):
        self.name = name

class Dog(Animal):
    def speak(self):
        return self.name + " makes a sound"

class Cat(Animal):
    def speak(self):
        return self.name + " makes a sound"
"#;
        let after = r#"
class Animal:
    def __init__(self, name):
        self.name = name

    def speak(self):
        return self.name + " makes a sound"

class Dog(Animal):
    pass

class Cat(Animal):
    def speak(self):
        return self.name + " makes a sound"
"#;
        let result = diff_sources(&[("zoo.py", before)], &[("zoo.py", after)]);
        assert_eq!(result.len(), 1, "records: {:?}", descriptions(&result));
        let Refactoring::PullUpOperation { before, after } = &result.refactorings()[0] else {
            panic!("expected a pull-up, got {:?}", descriptions(&result));
        };
        assert_eq!(before.qualified_name(), "zoo.Dog.speak");
        assert_eq!(after.qualified_name(), "zoo.Animal.speak");
        assert_eq!(result.for_type("zoo.Cat").count(), 0);
    }

    #[test]
    fn extract_superclass_from_two_classes() {
        let before = r#"
class Circle:
    def describe(self):
        return "shape with area " + str(self.area())

    def area(self):
        return 3.14 * self.r * self.r

class Square:
    def describe(self):
        return "shape with area " + str(self.area())

    def area(self):
        return self.side * self.side
"#;
        let after = r#"
class Shape:
    def describe(self):
        return "shape with area " + str(self.area())

class Circle(Shape):
    def area(self):
        return 3.14 * self.r * self.r

class Square(Shape):
    def area(self):
        return self.side * self.side
"#;
        let result = diff_sources(&[("shapes.py", before)], &[("shapes.py", after)]);
        let extract: Vec<&Refactoring> = result
            .of_kind(RefactoringKind::ExtractSuperclass)
            .collect();
        assert_eq!(extract.len(), 1, "records: {:?}", descriptions(&result));
        let Refactoring::ExtractSuperclass {
            subclasses,
            superclass,
        } = extract[0]
        else {
            unreachable!();
        };
        assert_eq!(superclass.qualified_name, "shapes.Shape");
        let names: Vec<&str> = subclasses.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Circle", "Square"]);
        assert_eq!(result.of_kind(RefactoringKind::PullUpOperation).count(), 2);
    }
}
