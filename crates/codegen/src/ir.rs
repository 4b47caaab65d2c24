//! Generated-code IR
//!
//! Generation passes describe what a stage needs (defines, structs, accessor functions,
//! preprocessor-guarded alternatives) as a list of items; rendering them to GLSL text is a
//! separate step, so another backend writer can consume the same items.

/// One unit of generated code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// `#define name value`
    Define { name: String, value: Option<String> },
    /// Struct type with `(type, declarator)` fields
    Struct { name: String, fields: Vec<(String, String)> },
    Function(Function),
    /// `#if condition` / `#else` / `#endif` around nested items
    Guard { condition: String, then: Vec<Item>, otherwise: Vec<Item> },
    /// Verbatim text, rendered with a trailing newline
    Raw(String),
    Comment(String),
}

impl Item {
    pub fn define(name: impl Into<String>, value: impl ToString) -> Self {
        Item::Define {
            name: name.into(),
            value: Some(value.to_string()),
        }
    }

    /// Define a `HD_HAS_<name>` presence flag
    pub fn has(name: &str) -> Self {
        Item::define(format!("HD_HAS_{name}"), 1)
    }
}

/// A function definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub return_type: String,
    pub name: String,
    pub params: Vec<String>,
    /// Body statements, one per line; lines starting with `#` are preprocessor directives
    pub body: Vec<String>,
}

impl Function {
    pub fn new(return_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            return_type: return_type.into(),
            name: name.into(),
            params: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.body.push(line.into());
        self
    }

    pub fn lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body.extend(lines.into_iter().map(Into::into));
        self
    }

    /// Single-statement function returning `expr`
    pub fn returning(mut self, expr: impl AsRef<str>) -> Self {
        self.body.push(format!("return {};", expr.as_ref()));
        self
    }

    /// Signature without the body, used to look functions up in tests and diagnostics
    pub fn signature(&self) -> String {
        format!("{} {}({})", self.return_type, self.name, self.params.join(", "))
    }
}

impl From<Function> for Item {
    fn from(function: Function) -> Self {
        Item::Function(function)
    }
}

/// Renders items as GLSL, appending to `out`
pub fn render_items(items: &[Item], out: &mut String) {
    for item in items {
        render_item(item, out);
    }
}

fn render_item(item: &Item, out: &mut String) {
    match item {
        Item::Define { name, value: Some(value) } => out.push_str(&format!("#define {name} {value}\n")),
        Item::Define { name, value: None } => out.push_str(&format!("#define {name}\n")),
        Item::Struct { name, fields } => {
            out.push_str(&format!("struct {name} {{\n"));
            for (ty, declarator) in fields {
                out.push_str(&format!("    {ty} {declarator};\n"));
            }
            out.push_str("};\n");
        }
        Item::Function(function) => {
            out.push_str(&format!("{} {{\n", function.signature()));
            for line in &function.body {
                if line.starts_with('#') {
                    out.push_str(&format!("{line}\n"));
                } else {
                    out.push_str(&format!("    {line}\n"));
                }
            }
            out.push_str("}\n");
        }
        Item::Guard { condition, then, otherwise } => {
            out.push_str(&format!("#if {condition}\n"));
            render_items(then, out);
            if !otherwise.is_empty() {
                out.push_str("#else\n");
                render_items(otherwise, out);
            }
            out.push_str("#endif\n");
        }
        Item::Raw(text) => {
            out.push_str(text);
            if !text.ends_with('\n') {
                out.push('\n');
            }
        }
        Item::Comment(text) => out.push_str(&format!("// {text}\n")),
    }
}
