use crate::core::value::Val;
use indexmap::IndexMap;

/// Statically known shape of a callee.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionSignature {
    pub name: String,
    pub returns_ref: bool,
    /// By-reference flag per declared parameter.
    pub by_ref_params: Vec<bool>,
}

impl FunctionSignature {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_params(mut self, by_ref: &[bool]) -> Self {
        self.by_ref_params = by_ref.to_vec();
        self
    }

    pub fn param_by_ref(&self, index: usize) -> bool {
        self.by_ref_params.get(index).copied().unwrap_or(false)
    }
}

/// Cross-unit symbol tables. Shared read-only between concurrently compiled units.
pub trait SymbolResolver: Sync {
    /// Canonical name of a class, interface or trait.
    fn resolve_type_name(&self, name: &str) -> Option<String>;
    fn resolve_constant(&self, name: &str) -> Option<Val>;
    fn resolve_function(&self, name: &str) -> Option<FunctionSignature>;
}

/// Fixed symbol tables, mostly useful for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbols {
    types: IndexMap<String, String>,
    constants: IndexMap<String, Val>,
    functions: IndexMap<String, FunctionSignature>,
}

impl StaticSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Core exception hierarchy, a few engine constants and some functions taking
    /// parameters by reference.
    pub fn with_builtins() -> Self {
        let mut symbols = Self::new();
        for ty in [
            "Throwable",
            "Exception",
            "Error",
            "ErrorException",
            "RuntimeException",
            "LogicException",
            "InvalidArgumentException",
            "TypeError",
        ] {
            symbols = symbols.with_type(ty);
        }
        symbols
            .with_constant("PHP_EOL", Val::String("\n".into()))
            .with_constant("PHP_INT_MAX", Val::Long(i64::MAX))
            .with_constant("PHP_INT_SIZE", Val::Int(8))
            .with_function(FunctionSignature::new("strlen").with_params(&[false]))
            .with_function(FunctionSignature::new("count").with_params(&[false, false]))
            .with_function(FunctionSignature::new("sort").with_params(&[true, false]))
            .with_function(FunctionSignature::new("array_push").with_params(&[true]))
            .with_function(FunctionSignature::new("preg_match").with_params(&[false, false, true]))
    }

    pub fn with_type(mut self, name: &str) -> Self {
        self.types.insert(name.to_ascii_lowercase(), name.to_string());
        self
    }

    pub fn with_constant(mut self, name: &str, value: Val) -> Self {
        self.constants.insert(name.to_string(), value);
        self
    }

    pub fn with_function(mut self, signature: FunctionSignature) -> Self {
        self.functions
            .insert(signature.name.to_ascii_lowercase(), signature);
        self
    }
}

impl SymbolResolver for StaticSymbols {
    fn resolve_type_name(&self, name: &str) -> Option<String> {
        let name = name.strip_prefix('\\').unwrap_or(name);
        self.types.get(&name.to_ascii_lowercase()).cloned()
    }

    fn resolve_constant(&self, name: &str) -> Option<Val> {
        // true/false/null are case-insensitive keywords, everything else is exact
        match name.to_ascii_lowercase().as_str() {
            "true" => Some(Val::Bool(true)),
            "false" => Some(Val::Bool(false)),
            "null" => Some(Val::Null),
            _ => self.constants.get(name).cloned(),
        }
    }

    fn resolve_function(&self, name: &str) -> Option<FunctionSignature> {
        let name = name.strip_prefix('\\').unwrap_or(name);
        self.functions.get(&name.to_ascii_lowercase()).cloned()
    }
}
