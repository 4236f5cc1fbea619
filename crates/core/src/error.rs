use crate::shader::ShaderSlot;

/// Result alias that carries the custom [`RenderError`] type.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The preset could not be constructed. No partial preset exists.
    #[error("failed to load preset: {0}")]
    Load(#[from] LoadError),
    /// A GPU object could not be allocated or addressed. Fatal mid-render.
    #[error("gpu failure: {0}")]
    Gpu(#[from] GpuError),
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for RenderError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for RenderError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Errors that abort preset construction.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not parse preset data: {0}")]
    Parse(String),
    #[error("{program} code does not compile: {source}")]
    Expression {
        program: &'static str,
        #[source]
        source: ExprError,
    },
    #[error("init code failed: {0}")]
    InitCode(#[source] ExprError),
    /// The built-in default shader failed. This indicates a defect in the
    /// engine or backend, never bad preset input.
    #[error("default shader for {slot} failed to compile: {source}")]
    DefaultShader {
        slot: ShaderSlot,
        #[source]
        source: ShaderError,
    },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Compile-time failures of preset formulas.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("line {line}, column {column}: {message}")]
    Syntax {
        line: u32,
        column: u32,
        message: String,
    },
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("function `{name}` takes {expected} argument(s), {found} given")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("left side of assignment is not assignable")]
    NotAssignable,
}

/// Shader preparation, binding and compile failures. Recovered by fallback
/// substitution except when they hit the built-in default.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShaderError {
    #[error("shader text has no `shader_body` block")]
    MissingBody,
    #[error("unbalanced `{0}` in shader text")]
    Unbalanced(char),
    #[error("sampler `{0}` does not resolve to a texture")]
    UnboundSampler(String),
    #[error("backend compile failed: {0}")]
    Compile(String),
}

/// Backend resource failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GpuError {
    #[error("could not allocate {what} of {width}x{height}")]
    Allocation {
        what: &'static str,
        width: u32,
        height: u32,
    },
    #[error("unknown backend resource {0}")]
    UnknownResource(u32),
}
