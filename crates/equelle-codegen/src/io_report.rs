//! The program's inputs and outputs.
//!
//! Lists every `Input*` call with its tag, default and expected type, and
//! every `Output*` call with its tag and the type of the data written. A
//! simulator setup uses this to know which parameter files to provide.

use std::fmt;

use equelle_sema::SymbolTable;
use equelle_types::ast::Node;
use equelle_types::visit::{walk, AstVisitor, Flow};
use equelle_types::ValueType;
use serde::Serialize;

use crate::error::{CodegenError, CodegenResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IoEntry {
    Input {
        function: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        /// The default as written in the source.
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<String>,
        #[serde(rename = "type")]
        ty: String,
    },
    Output {
        #[serde(skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
        data_type: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IoReport {
    pub entries: Vec<IoEntry>,
}

impl IoReport {
    /// Collect the report for a checked program.
    pub fn collect(program: &Node, symbols: &SymbolTable) -> CodegenResult<Self> {
        let mut collector = IoCollector {
            symbols,
            report: IoReport::default(),
        };
        walk(program, &mut collector)?;
        Ok(collector.report)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &IoEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e, IoEntry::Input { .. }))
    }

    pub fn outputs(&self) -> impl Iterator<Item = &IoEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e, IoEntry::Output { .. }))
    }

    pub fn to_json(&self) -> CodegenResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for IoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match entry {
                IoEntry::Input {
                    tag, default, ty, ..
                } => {
                    writeln!(f, "Input")?;
                    if let Some(tag) = tag {
                        writeln!(f, "Tag: {tag}")?;
                    }
                    if let Some(default) = default {
                        writeln!(f, "Default: {default}")?;
                    }
                    writeln!(f, "Type: {ty}")?;
                }
                IoEntry::Output { tag, data_type } => {
                    writeln!(f, "Output")?;
                    if let Some(tag) = tag {
                        writeln!(f, "Tag: {tag}")?;
                    }
                    if let Some(ty) = data_type {
                        writeln!(f, "Type: {ty}")?;
                    }
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ── Collection ────────────────────────────────────────────────────────────────

struct IoCollector<'a> {
    symbols: &'a SymbolTable,
    report: IoReport,
}

impl IoCollector<'_> {
    /// Argument expressions of a call, paired with the declared parameter
    /// names.
    fn named_args<'n>(&self, name: &str, args: &'n Node) -> CodegenResult<Vec<(String, &'n Node)>> {
        let signature = self
            .symbols
            .function(name)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("function {name}")))?;
        let Node::FuncCallArgs(args) = args else {
            return Err(CodegenError::Internal(format!(
                "call to {name} has a {} for arguments",
                args.kind_name()
            )));
        };
        Ok(signature
            .params
            .iter()
            .map(|p| p.name.clone())
            .zip(args.iter())
            .collect())
    }

    fn input(&self, name: &str, args: &Node, ty: &ValueType) -> CodegenResult<IoEntry> {
        let mut tag = None;
        let mut default = None;
        for (param, arg) in self.named_args(name, args)? {
            match (param.as_str(), arg) {
                ("name", Node::Str(text)) => tag = Some(text.clone()),
                ("default", Node::Number { text, .. }) => default = Some(text.clone()),
                _ => {}
            }
        }
        Ok(IoEntry::Input {
            function: name.to_string(),
            tag,
            default,
            ty: self.symbols.type_string(ty),
        })
    }

    fn output(&self, name: &str, args: &Node) -> CodegenResult<IoEntry> {
        let mut tag = None;
        let mut data_type = None;
        for (param, arg) in self.named_args(name, args)? {
            match (param.as_str(), arg) {
                ("tag", Node::Str(text)) => tag = Some(text.clone()),
                ("data", _) => data_type = Some(self.symbols.type_string(&arg.ty())),
                _ => {}
            }
        }
        Ok(IoEntry::Output { tag, data_type })
    }
}

impl AstVisitor for IoCollector<'_> {
    type Error = CodegenError;

    fn enter(&mut self, node: &Node) -> CodegenResult<Flow> {
        if let Node::FuncCall { name, args, ty, .. } = node {
            if name.starts_with("Input") {
                let entry = self.input(name, args, ty)?;
                self.report.entries.push(entry);
            } else if name.starts_with("Output") {
                let entry = self.output(name, args)?;
                self.report.entries.push(entry);
            }
        }
        Ok(Flow::Continue)
    }
}
