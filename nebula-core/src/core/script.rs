//! Script definitions: functions, bundle definitions and their namespace
//!
//! Everything here is immutable once [`ScriptBuilder::build`] hands out the
//! `Arc<Script>`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::instruction::Instruction;
use super::value::ValueKind;

/// Immutable record layout
#[derive(Clone, Debug, PartialEq)]
pub struct BundleDefinition {
    name: String,
    fields: Vec<(String, ValueKind)>,
}

impl BundleDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<(String, ValueKind)>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[(String, ValueKind)] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }
}

/// Function attributes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionAttribute {
    /// Spawned as its own logical thread when the script is added
    AutoExec,
}

impl FunctionAttribute {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "autoexec" => Some(FunctionAttribute::AutoExec),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FunctionAttribute::AutoExec => "autoexec",
        }
    }
}

/// One script function
#[derive(Clone, Debug)]
pub struct Function {
    namespace: String,
    name: String,
    source: Option<String>,
    /// `None` means void
    return_kind: Option<ValueKind>,
    parameters: Vec<ValueKind>,
    locals: Vec<ValueKind>,
    attributes: Vec<FunctionAttribute>,
    body: Vec<Instruction>,
}

impl Function {
    // ==================== construction ====================

    pub fn new(name: impl Into<String>, return_kind: Option<ValueKind>) -> Self {
        Self {
            namespace: String::new(),
            name: name.into(),
            source: None,
            return_kind,
            parameters: Vec::new(),
            locals: Vec::new(),
            attributes: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<ValueKind>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_locals(mut self, locals: Vec<ValueKind>) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_attribute(mut self, attribute: FunctionAttribute) -> Self {
        if !self.attributes.contains(&attribute) {
            self.attributes.push(attribute);
        }
        self
    }

    pub fn with_body(mut self, body: Vec<Instruction>) -> Self {
        self.body = body;
        self
    }

    pub fn push_instruction(&mut self, instruction: Instruction) {
        self.body.push(instruction);
    }

    pub fn set_locals(&mut self, locals: Vec<ValueKind>) {
        self.locals = locals;
    }

    // ==================== accessors ====================

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn return_kind(&self) -> Option<ValueKind> {
        self.return_kind
    }

    pub fn parameters(&self) -> &[ValueKind] {
        &self.parameters
    }

    pub fn locals(&self) -> &[ValueKind] {
        &self.locals
    }

    pub fn attributes(&self) -> &[FunctionAttribute] {
        &self.attributes
    }

    pub fn body(&self) -> &[Instruction] {
        &self.body
    }

    pub fn is_auto_exec(&self) -> bool {
        self.attributes.contains(&FunctionAttribute::AutoExec)
    }

    /// `ns::name(int32, string)`
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.parameters.iter().map(|k| k.name()).collect();
        format!("{}::{}({})", self.namespace, self.name, params.join(", "))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// A loaded namespace
#[derive(Debug)]
pub struct Script {
    namespace: String,
    source: Option<String>,
    functions: BTreeMap<String, Arc<Function>>,
    bundles: BTreeMap<String, Arc<BundleDefinition>>,
}

impl Script {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn function(&self, name: &str) -> Option<&Arc<Function>> {
        self.functions.get(name)
    }

    pub fn bundle(&self, name: &str) -> Option<&Arc<BundleDefinition>> {
        self.bundles.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Arc<Function>> {
        self.functions.values()
    }

    pub fn bundles(&self) -> impl Iterator<Item = &Arc<BundleDefinition>> {
        self.bundles.values()
    }

    pub fn auto_exec_functions(&self) -> impl Iterator<Item = &Arc<Function>> {
        self.functions.values().filter(|f| f.is_auto_exec())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("function '{0}' is already defined")]
    DuplicateFunction(String),
    #[error("bundle '{0}' is already defined")]
    DuplicateBundle(String),
}

/// Collects definitions and freezes them into a [`Script`]
#[derive(Debug)]
pub struct ScriptBuilder {
    namespace: String,
    source: Option<String>,
    functions: BTreeMap<String, Function>,
    bundles: BTreeMap<String, Arc<BundleDefinition>>,
}

impl ScriptBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            source: None,
            functions: BTreeMap::new(),
            bundles: BTreeMap::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = namespace.into();
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn add_function(&mut self, function: Function) -> Result<(), ScriptError> {
        if self.functions.contains_key(function.name()) {
            return Err(ScriptError::DuplicateFunction(function.name().to_string()));
        }
        self.functions.insert(function.name().to_string(), function);
        Ok(())
    }

    pub fn add_bundle(&mut self, definition: BundleDefinition) -> Result<(), ScriptError> {
        if self.bundles.contains_key(definition.name()) {
            return Err(ScriptError::DuplicateBundle(definition.name().to_string()));
        }
        self.bundles
            .insert(definition.name().to_string(), Arc::new(definition));
        Ok(())
    }

    pub fn build(self) -> Arc<Script> {
        let namespace = self.namespace;
        let source = self.source;
        let functions = self
            .functions
            .into_iter()
            .map(|(name, mut f)| {
                f.namespace = namespace.clone();
                f.source = source.clone();
                (name, Arc::new(f))
            })
            .collect();
        Arc::new(Script {
            namespace,
            source,
            functions,
            bundles: self.bundles,
        })
    }
}
