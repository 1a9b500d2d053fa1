//! Module Loading
//!
//! A module is an object used as a namespace: executing a file runs its
//! compiled entry function with a fresh module object as both self and
//! owning module, and top-level definitions land in that object's members.
//!
//! `import` is idempotent per canonical path; `load` always re-executes;
//! `require` resolves a bare name against the load-path list and imports
//! it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use rime_core::{Value, intern};

use crate::error::{RtResult, RuntimeError};
use crate::function::{create_call_frame_in_module, create_function, function_call};
use crate::heap::ObjRef;
use crate::object::{create_object, set_name};
use crate::{array, process, string};

/// Source file extension tried during resolution.
const SOURCE_EXTENSION: &str = "rime";

static MODULE_TABLE: OnceLock<Mutex<HashMap<PathBuf, Value>>> = OnceLock::new();
static LOAD_PATHS: OnceLock<ObjRef> = OnceLock::new();

fn module_table() -> &'static Mutex<HashMap<PathBuf, Value>> {
    MODULE_TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// The load-path list, an array of string objects. Starts as `lib` and the
/// working directory; the host may append.
pub fn load_paths() -> ObjRef {
    *LOAD_PATHS.get_or_init(|| {
        let paths = array::create();
        array::push(paths, string::create("lib").value());
        array::push(paths, string::create(".").value());
        paths
    })
}

pub fn add_load_path(path: &str) {
    array::push(load_paths(), string::create(path).value());
}

/// Resolve a module spec: an existing path wins, otherwise each load path
/// is tried with and without the source extension.
fn resolve(spec: &str) -> RtResult<PathBuf> {
    let direct = Path::new(spec);
    if direct.exists() {
        return Ok(direct.to_path_buf());
    }
    for base in array::snapshot(load_paths()) {
        let Some(base) = ObjRef::from_value(base) else {
            continue;
        };
        let base = PathBuf::from(string::snapshot(base));
        let candidate = base.join(spec);
        if candidate.exists() {
            return Ok(candidate);
        }
        let with_ext = candidate.with_extension(SOURCE_EXTENSION);
        if with_ext.exists() {
            return Ok(with_ext);
        }
    }
    Err(RuntimeError::compile_error(format!(
        "could not find module '{spec}' in load paths"
    )))
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Load and execute a file once per canonical path; subsequent imports
/// return the cached module object.
pub fn import(spec: &str) -> RtResult<Value> {
    let path = canonical(&resolve(spec)?);
    if let Some(cached) = module_table()
        .lock()
        .expect("module table lock poisoned")
        .get(&path)
        .copied()
    {
        tracing::debug!(module = %path.display(), "import hit module table");
        return Ok(cached);
    }
    let module = execute_file(&path)?;
    module_table()
        .lock()
        .expect("module table lock poisoned")
        .insert(path, module);
    Ok(module)
}

/// Execute a file unconditionally, returning its module object.
pub fn load(spec: &str) -> RtResult<Value> {
    execute_file(&resolve(spec)?)
}

/// Resolve a bare name against the load paths and import it.
pub fn require(spec: &str) -> RtResult<Value> {
    tracing::info!(module = spec, "require");
    import(spec)
}

fn execute_file(path: &Path) -> RtResult<Value> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        RuntimeError::compile_error(format!("cannot read '{}': {e}", path.display()))
    })?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("<module>");
    tracing::debug!(module = name, path = %path.display(), "compiling module");
    execute_source(name, &source)
}

/// Compile and run source as a fresh module.
pub fn execute_source(name: &str, source: &str) -> RtResult<Value> {
    let descriptor = process::backend()?
        .compile(name, source)
        .map_err(|e| RuntimeError::compile_error(e.message))?;
    let function = create_function(descriptor, None);
    let module = create_object(None);
    set_name(module, intern(name));
    let frame = create_call_frame_in_module(function, None, &[], &[], Some(module))?;
    function_call(function, frame, module.value(), Value::UNDEFINED)?;
    Ok(module.value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_module_fails() {
        let err = resolve("definitely_not_a_real_module_name").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CompileError);
    }

    #[test]
    fn test_load_paths_start_with_lib_and_cwd() {
        let paths = array::snapshot(load_paths());
        assert!(paths.len() >= 2);
        let first = string::snapshot(ObjRef::from_value(paths[0]).unwrap());
        assert_eq!(first, "lib");
    }
}
