//! Model Assembler: one [`Model`] per revision.
//!
//! Files are built in path order so type ids, and with them every tie-break
//! in the matcher, are identical across runs.

use std::path::Path;

use tracing::{debug, info};

use refdiff_core::model::Model;

use crate::builder::{BuildResult, PythonTreeBuilder};
use crate::files::collect_python_files;

/// Build a model from `(path, source)` pairs.
///
/// Paths are revision-relative. A file listed twice keeps its last source.
pub fn build_model<I, P, S>(files: I) -> BuildResult<Model>
where
    I: IntoIterator<Item = (P, S)>,
    P: AsRef<str>,
    S: AsRef<str>,
{
    let mut files: Vec<(String, String)> = files
        .into_iter()
        .map(|(p, s)| (p.as_ref().replace('\\', "/"), s.as_ref().to_string()))
        .collect();
    files.reverse();
    files.sort_by(|(a, _), (b, _)| a.cmp(b));
    files.dedup_by(|(a, _), (b, _)| a == b);

    let mut builder = PythonTreeBuilder::new()?;
    let mut paths = Vec::with_capacity(files.len());
    let mut types = Vec::new();
    for (path, source) in &files {
        types.extend(builder.build_file(path, source)?);
        paths.push(path.clone());
    }
    debug!(files = paths.len(), types = types.len(), "assembled model");
    Ok(Model::new(paths, types))
}

/// Collect every Python file under `root` and build its model.
pub fn build_model_from_dir(root: &Path) -> BuildResult<Model> {
    let files = collect_python_files(root)?;
    info!(root = %root.display(), files = files.len(), "building model");
    build_model(files)
}
