//! Entry point of the diff engine.
//!
//! `diff` validates both models, builds body profiles, runs the matcher and
//! the classifier and assembles a [`DiffResult`]. Neither model is mutated;
//! independent diffs share no state and may run on separate threads.

use tracing::{debug, info};

use crate::classify::Classifier;
use crate::config::DiffConfig;
use crate::matcher::{EntityMatcher, ModelProfiles};
use crate::model::{Model, ModelError};
use crate::result::DiffResult;

/// Diff two models with the default configuration.
///
/// Fails only when a model violates its invariants; finding nothing is an
/// empty result, not an error.
pub fn diff(before: &Model, after: &Model) -> Result<DiffResult, ModelError> {
    diff_with_config(before, after, &DiffConfig::default())
}

/// Diff two models with explicit thresholds.
pub fn diff_with_config(
    before: &Model,
    after: &Model,
    config: &DiffConfig,
) -> Result<DiffResult, ModelError> {
    before.validate()?;
    after.validate()?;
    debug!(
        before_types = before.types().len(),
        after_types = after.types().len(),
        "diff started"
    );

    let before_profiles = ModelProfiles::new(before);
    let after_profiles = ModelProfiles::new(after);

    let matches =
        EntityMatcher::new(before, after, &before_profiles, &after_profiles, config).run();
    let records = Classifier::new(
        before,
        after,
        &before_profiles,
        &after_profiles,
        config,
        &matches,
    )
    .run();

    let result = DiffResult::new(records, &matches, before, after);
    info!(refactorings = result.len(), "diff complete");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Statement, StmtKind};
    use crate::model::{Operation, Parameter, TypeDecl};
    use crate::refactoring::RefactoringKind;

    fn sum_method() -> Operation {
        Operation::method("sum")
            .with_params(vec![Parameter::new("x"), Parameter::new("y")])
            .with_body(vec![Statement::bare(StmtKind::Return {
                value: Some(Expr::BinOp {
                    op: "+".to_string(),
                    left: Box::new(Expr::name("x")),
                    right: Box::new(Expr::name("y")),
                }),
            })])
    }

    #[test]
    fn identity_law() {
        let model = Model::from_types(vec![
            TypeDecl::module_container("calc", "calc.py").with_operation(Operation::new("main")),
            TypeDecl::class("Calculator", "calc", "calc.py").with_operation(sum_method()),
        ]);
        let result = diff(&model, &model).unwrap();
        assert!(result.is_empty());
        assert!(result.added_types().is_empty());
        assert!(result.removed_types().is_empty());
        assert!(result.added_operations().is_empty());
        assert!(result.removed_operations().is_empty());
    }

    #[test]
    fn empty_models() {
        let result = diff(&Model::default(), &Model::default()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn invalid_model_is_rejected() {
        let broken = Model::from_types(vec![
            TypeDecl::class("A", "m", "m.py"),
            TypeDecl::class("A", "m", "m.py"),
        ]);
        assert!(diff(&broken, &Model::default()).is_err());
        assert!(diff(&Model::default(), &broken).is_err());
    }

    #[test]
    fn free_function_moved_between_modules() {
        let helper = Operation::new("helper").with_body(sum_method().body);
        let before = Model::from_types(vec![
            TypeDecl::module_container("a", "a.py").with_operation(helper.clone()),
            TypeDecl::module_container("b", "b.py"),
        ]);
        let after = Model::from_types(vec![
            TypeDecl::module_container("a", "a.py"),
            TypeDecl::module_container("b", "b.py").with_operation(helper),
        ]);
        let result = diff(&before, &after).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.refactorings()[0].kind(),
            RefactoringKind::MoveOperation
        );
        assert!(result.added_types().is_empty());
    }

    #[test]
    fn stricter_config_rejects_weak_rename() {
        let before = Model::from_types(vec![
            TypeDecl::class("Calculator", "calc", "calc.py").with_operation(sum_method()),
        ]);
        let mut renamed = sum_method();
        renamed.name = "add".to_string();
        let after = Model::from_types(vec![
            TypeDecl::class("Calculator", "calc", "calc.py").with_operation(renamed),
        ]);
        let default = diff(&before, &after).unwrap();
        assert_eq!(default.of_kind(RefactoringKind::RenameOperation).count(), 1);

        let config = DiffConfig {
            rename_threshold: 1.0,
            move_rename_threshold: 1.0,
            min_body_tokens: 100,
            ..DiffConfig::default()
        };
        let strict = diff_with_config(&before, &after, &config).unwrap();
        assert!(strict.is_empty());
        assert_eq!(strict.added_operations().len(), 1);
    }
}
