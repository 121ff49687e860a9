//! Shared helpers for Lilium integration tests
//!
//! `run_program!` compiles a single-module program, links it and runs it to
//! completion, returning the value of the last entry expression. An optional
//! second argument supplies the VM configuration.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lilium::backend::bytecode::{compile_source, link_modules, BytecodeVM, Image, Module, VmConfig};

macro_rules! run_program {
    ($program:expr) => {
        $crate::common::try_run($program, ::lilium::VmConfig::default()).expect("program should run")
    };
    ($program:expr, $config:expr) => {
        $crate::common::try_run($program, $config).expect("program should run")
    };
}

/// Compile one source text to a loaded module
pub fn module(name: &str, source: &str) -> Module {
    compile_source(name, source)
        .expect("compilation should succeed")
        .to_module()
        .expect("compiled module should load")
}

/// Compile, link and wrap a single-module program
pub fn image(source: &str) -> Arc<Image> {
    Arc::new(link_modules(vec![module("test", source)]).expect("link should succeed"))
}

pub fn try_run(source: &str, config: VmConfig) -> Result<i64, lilium::RuntimeError> {
    BytecodeVM::with_config(image(source), config).run()
}

/// VM configuration with a bounded call stack
pub fn call_stack(max_call_stack: usize) -> VmConfig {
    VmConfig {
        max_call_stack,
        ..VmConfig::default()
    }
}

/// Fresh per-test scratch directory under the system temp dir
pub fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lilium-{}-{}", test, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
    dir
}

/// Compile `source` and write the module file as `<dir>/<name>.mod`
pub fn write_module(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(format!("{}.mod", name));
    let compiled = compile_source(name, source).expect("compilation should succeed");
    std::fs::write(&path, compiled.bytes()).expect("module file should be writable");
    path
}
