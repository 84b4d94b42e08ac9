//! Scripted program model run by the simulator.
//!
//! A program is a set of classes, each declared in a source file, with methods made of
//! numbered statements. There is no control flow besides calls: every statement is one
//! executable line, which is all a line-granularity debugger needs.

use std::{collections::HashSet, fs, path::Path};

use eyre::{bail, ensure, Result, WrapErr};
use serde::{Deserialize, Serialize};

const DEMO_PROGRAM: &str = include_str!("demo.toml");

fn default_entry_method() -> String {
    "main".into()
}

fn default_max_steps() -> usize {
    100_000
}

/// A complete program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Class declaring the entry routine
    pub entry_class: String,
    /// Name of the entry routine
    #[serde(default = "default_entry_method")]
    pub entry_method: String,
    /// Number of executed statements after which the program is stopped
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Declared classes
    pub classes: Vec<ClassDef>,
}

/// A class and the source file declaring it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Class name
    pub name: String,
    /// Source file name (e.g. `Main.java`)
    pub source_file: String,
    /// Instance fields
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Methods
    pub methods: Vec<MethodDef>,
}

/// An instance field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub type_name: String,
}

/// A method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Parameter names
    #[serde(default)]
    pub params: Vec<String>,
    /// Statements, one per line
    pub body: Vec<Stmt>,
}

/// A statement on a source line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// Source line
    pub line: u32,
    /// What the statement does
    #[serde(flatten)]
    pub op: Op,
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Op {
    /// Assigns a local variable.
    Let {
        /// Variable name
        var: String,
        /// Assigned value
        value: Expr,
    },
    /// Allocates an instance of a class into a local variable.
    New {
        /// Variable name
        var: String,
        /// Class to instantiate
        class: String,
    },
    /// Allocates an array into a local variable.
    Array {
        /// Variable name
        var: String,
        /// Element type name
        element_type: String,
        /// Initial elements
        items: Vec<Expr>,
    },
    /// Assigns a field of the object held by a variable (or `this`).
    Set {
        /// Variable holding the object
        object: String,
        /// Field name
        field: String,
        /// Assigned value
        value: Expr,
    },
    /// Calls a method, on the object held by `receiver` or statically on `class`.
    Call {
        /// Method name
        method: String,
        /// Variable holding the receiver
        #[serde(default)]
        receiver: Option<String>,
        /// Class for static calls, defaults to the calling class
        #[serde(default)]
        class: Option<String>,
        /// Argument values
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Writes a line to stdout.
    Print(Expr),
}

/// Expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expr {
    /// Integer literal
    Int(i64),
    /// Boolean literal
    Bool(bool),
    /// String literal
    Str(String),
    /// Local variable, `this` included
    Var(String),
    /// Field of the object held by a variable
    Field(String, String),
    /// Integer addition, or concatenation when either side is a string
    Add(Box<Expr>, Box<Expr>),
    /// The null reference
    Null,
    /// A value the debugger cannot read
    Opaque,
}

impl Program {
    /// Parses a program from TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        let program: Self = toml::from_str(content).wrap_err("Failed to parse program")?;
        program.validate()?;
        Ok(program)
    }

    /// Loads a program from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read program file: {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid program: {}", path.display()))
    }

    /// The built-in demo program.
    pub fn demo() -> Result<Self> {
        Self::from_toml(DEMO_PROGRAM)
    }

    /// Looks up a class by name.
    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Checks the structural rules the simulator relies on.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for class in &self.classes {
            ensure!(names.insert(class.name.as_str()), "Duplicate class {}", class.name);
            for method in &class.methods {
                ensure!(
                    !method.body.is_empty(),
                    "Method {}.{} has no statements",
                    class.name,
                    method.name
                );
            }
        }
        let Some(entry) = self.class(&self.entry_class) else {
            bail!("Entry class {} is not declared", self.entry_class);
        };
        ensure!(
            entry.method(&self.entry_method).is_some(),
            "Entry method {}.{} is not declared",
            self.entry_class,
            self.entry_method
        );
        Ok(())
    }
}

impl ClassDef {
    /// Looks up a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// The method with a statement at `line`.
    pub fn method_at(&self, line: u32) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.body.iter().any(|s| s.line == line))
    }
}
