//! Module loading against a minimal test backend: import idempotence,
//! load re-execution, and load-path resolution. The backend "compiles"
//! any source to a body that records the execution and stores a member on
//! the module object.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rime_core::{Value, intern};
use rime_runtime::function::FunctionDescriptor;
use rime_runtime::heap::ObjRef;
use rime_runtime::vm::{Backend, CompileError};
use rime_runtime::{RtResult, dispatch, module, process};
use serial_test::serial;

static EXECUTIONS: AtomicUsize = AtomicUsize::new(0);

fn module_body(_frame: Value, self_value: Value, _it: Value) -> RtResult<Value> {
    EXECUTIONS.fetch_add(1, Ordering::SeqCst);
    dispatch::set_member(self_value, intern("loaded"), Value::integer(42))?;
    Ok(Value::integer(42))
}

struct TestBackend;

impl Backend for TestBackend {
    fn name(&self) -> &str {
        "test"
    }

    fn compile(
        &self,
        module_name: &str,
        source: &str,
    ) -> Result<Arc<FunctionDescriptor>, CompileError> {
        if source.contains("syntax error") {
            return Err(CompileError::new(format!("{module_name}: bad input")));
        }
        Ok(FunctionDescriptor::scripted(module_name, module_body, &[], &[]))
    }
}

fn setup() {
    process::init(Box::new(TestBackend));
}

fn write_module(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "anything\n").unwrap();
    path
}

#[test]
#[serial]
fn test_eval_runs_in_global_module() {
    setup();
    let result = process::eval("anything").unwrap();
    assert_eq!(result, Value::integer(42));
    // The module body stored onto self, which for eval is the global
    // module.
    assert_eq!(
        process::get_global(intern("loaded")).unwrap(),
        Value::integer(42)
    );
}

#[test]
#[serial]
fn test_compile_error_surfaces() {
    setup();
    let err = process::eval("syntax error here").unwrap_err();
    assert_eq!(err.kind(), rime_runtime::ErrorKind::CompileError);
}

#[test]
#[serial]
fn test_import_is_idempotent_per_path() {
    setup();
    let dir = tempfile::tempdir().unwrap();
    let path = write_module(dir.path(), "once.rime");
    let spec = path.to_string_lossy().to_string();

    let before = EXECUTIONS.load(Ordering::SeqCst);
    let first = module::import(&spec).unwrap();
    let second = module::import(&spec).unwrap();
    assert_eq!(first, second);
    assert_eq!(EXECUTIONS.load(Ordering::SeqCst), before + 1);

    // The module object carries what the body stored.
    let module_obj = ObjRef::from_value(first).unwrap();
    assert_eq!(
        dispatch::get_member(module_obj.value(), intern("loaded")).unwrap(),
        Value::integer(42)
    );
}

#[test]
#[serial]
fn test_load_always_reexecutes() {
    setup();
    let dir = tempfile::tempdir().unwrap();
    let path = write_module(dir.path(), "again.rime");
    let spec = path.to_string_lossy().to_string();

    let before = EXECUTIONS.load(Ordering::SeqCst);
    module::load(&spec).unwrap();
    module::load(&spec).unwrap();
    assert_eq!(EXECUTIONS.load(Ordering::SeqCst), before + 2);
}

#[test]
#[serial]
fn test_require_resolves_against_load_paths() {
    setup();
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "findme.rime");
    module::add_load_path(&dir.path().to_string_lossy());

    let module_value = module::require("findme").unwrap();
    assert!(module_value.is_object());
}

#[test]
#[serial]
fn test_missing_module_reports_compile_error() {
    setup();
    let err = module::require("no_such_module_anywhere").unwrap_err();
    assert_eq!(err.kind(), rime_runtime::ErrorKind::CompileError);
}
