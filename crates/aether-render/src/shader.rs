//! Shader module compilation with diagnostic capture.
//!
//! Provides [`ShaderRegistry`], a registry of compiled WGSL modules keyed by
//! name. Compilation errors are captured through a validation error scope and
//! surfaced as [`ShaderError`] instead of the default uncaptured-error panic.

use log::debug;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use wgpu::{ShaderModuleDescriptor, ShaderSource};

/// Error types for shader compilation.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader '{name}' failed to compile: {message}")]
    CompilationFailed { name: String, message: String },

    #[error("shader '{name}' not found in registry")]
    NotLoaded { name: String },
}

/// Central registry for compiled shader modules.
pub struct ShaderRegistry {
    modules: HashMap<String, Arc<wgpu::ShaderModule>>,
}

impl ShaderRegistry {
    /// Create a new empty shader registry.
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Compile a WGSL source string, cache the module under `name`, and
    /// return it. On failure the broken module is not cached and the
    /// compiler log is carried in the error.
    pub fn load_from_source(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        source: &str,
    ) -> Result<Arc<wgpu::ShaderModule>, ShaderError> {
        debug!("Compiling shader '{}'", name);
        let module = compile(device, name, source)?;
        let module = Arc::new(module);
        self.modules.insert(name.to_string(), module.clone());
        Ok(module)
    }

    /// Get a previously compiled shader by name.
    pub fn get(&self, name: &str) -> Option<Arc<wgpu::ShaderModule>> {
        self.modules.get(name).cloned()
    }

    /// Number of compiled shaders.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for ShaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile a WGSL module, converting validation errors raised during
/// creation into a [`ShaderError`] with the compiler message.
pub fn compile(
    device: &wgpu::Device,
    name: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, ShaderError> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(ShaderModuleDescriptor {
        label: Some(name),
        source: ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(scope.pop()) {
        None => Ok(module),
        Some(error) => Err(ShaderError::CompilationFailed {
            name: name.to_string(),
            message: error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessContext;

    const VALID_SHADER: &str = r#"
        @vertex
        fn vs_main(@builtin(vertex_index) idx: u32) -> @builtin(position) vec4<f32> {
            return vec4<f32>(0.0, 0.0, 0.0, 1.0);
        }
    "#;

    const INVALID_SHADER: &str = r#"
        @vertex
        fn vs_main() -> @builtin(position) vec4<f32> {
            return undeclared_variable;
        }
    "#;

    fn test_context() -> Option<HeadlessContext> {
        HeadlessContext::new(wgpu::Features::empty()).ok()
    }

    #[test]
    fn test_load_valid_shader_succeeds() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut registry = ShaderRegistry::new();
        registry
            .load_from_source(&ctx.device, "valid", VALID_SHADER)
            .expect("valid shader should compile");
        assert_eq!(registry.len(), 1);
        assert!(registry.get("valid").is_some());
    }

    #[test]
    fn test_registry_keeps_one_module_per_name() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut registry = ShaderRegistry::new();
        registry
            .load_from_source(&ctx.device, "pass-a", VALID_SHADER)
            .unwrap();
        registry
            .load_from_source(&ctx.device, "pass-b", VALID_SHADER)
            .unwrap();
        assert_eq!(registry.len(), 2);
        // Reloading under an existing name replaces the module in place.
        registry
            .load_from_source(&ctx.device, "pass-a", VALID_SHADER)
            .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_invalid_shader_reports_compiler_log() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut registry = ShaderRegistry::new();
        let err = registry
            .load_from_source(&ctx.device, "broken", INVALID_SHADER)
            .expect_err("broken shader must not compile");
        match err {
            ShaderError::CompilationFailed { name, message } => {
                assert_eq!(name, "broken");
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(registry.get("broken").is_none());
    }
}
