//! Syntax trees: the template node tree, the linear part sequence, and the
//! embedded script language.

// ---------------------------------------------------------------------------
// Template tree
// ---------------------------------------------------------------------------

/// One attribute of an element's opening tag.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrFragment {
    /// `key="value"` or a bare `key`. The value is raw: it is HTML-escaped,
    /// and its `#{}`/`!{}` injections expanded, when the tag is emitted.
    Static { name: String, value: Option<String> },
    /// `key=expr`: rendered, or omitted, from the value of `expr`.
    Dynamic { name: String, expr: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<AttrFragment>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push(AttrFragment::Static {
            name: name.into(),
            value: Some(value.into()),
        });
        self
    }

    /// Value of the static `id` attribute, if any.
    pub fn id(&self) -> Option<&str> {
        self.static_attr("id")
    }

    /// Classes of the static `class` attribute.
    pub fn classes(&self) -> Vec<&str> {
        self.static_attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    fn static_attr(&self, wanted: &str) -> Option<&str> {
        self.attrs.iter().find_map(|attr| match attr {
            AttrFragment::Static {
                name,
                value: Some(v),
            } if name == wanted => Some(v.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    /// `//-` comments and lines degraded after a warning; renders nothing.
    Suppressed,
    Element(Element),
    /// `//` comment with its optional inline text.
    Comment(Option<String>),
    /// A `:name` block awaiting its filter; replaced before parsing ends.
    Filter(String),
    /// Final literal text.
    Text(String),
    /// Literal text that may carry `#{}` / `!{}` injections.
    Interpolated(String),
    /// A `-` line.
    Statement(String),
    /// `=` expression, HTML-escaped at render time.
    Escaped(String),
    /// `!=` expression, inserted as is.
    Raw(String),
    Include(String),
    Extends(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<Node>,
    /// Deeper-indented lines are absorbed as literal text.
    pub is_text: bool,
    /// Nested lines are a usage error and are not rendered.
    pub no_children: bool,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            is_text: false,
            no_children: false,
        }
    }

    pub fn root() -> Self {
        Self::new(NodeKind::Root)
    }

    pub fn element(element: Element) -> Self {
        Self::new(NodeKind::Element(element))
    }

    pub fn text(text: impl Into<String>) -> Self {
        let mut node = Self::new(NodeKind::Text(text.into()));
        node.no_children = true;
        node
    }

    pub fn interpolated(text: impl Into<String>) -> Self {
        let mut node = Self::new(NodeKind::Interpolated(text.into()));
        node.no_children = true;
        node
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn as_element(&self) -> Option<&Element> {
        match &self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Produces no output of its own; its children inherit the layout of
    /// the enclosing block.
    pub fn is_transparent(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Statement(_)
                | NodeKind::Suppressed
                | NodeKind::Include(_)
                | NodeKind::Extends(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Literal(String),
    /// Expression whose string value is HTML-escaped.
    Escaped(String),
    /// Expression whose string value is inserted unescaped.
    Raw(String),
    /// Expression appended without the undefined guard; it carries its own.
    Unguarded(String),
    /// Verbatim script statement.
    Statement(String),
}

// ---------------------------------------------------------------------------
// Script language
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Var(String),
    Member(Box<Expr>, String), // foo.bar
    Index(Box<Expr>, Box<Expr>), // foo[bar]
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(Box<Expr>, AssignOp, Box<Expr>),
    Update {
        target: Box<Expr>,
        increment: bool,
        prefix: bool,
    },
}

impl Expr {
    /// Whether the expression can appear on the left of an assignment.
    pub fn is_place(&self) -> bool {
        matches!(self, Expr::Var(_) | Expr::Member(..) | Expr::Index(..))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForEachKind {
    /// `for (k in obj)`: keys.
    In,
    /// `for (x of xs)`: values.
    Of,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Append output slot `n` of the program.
    Emit(usize),
    Expr(Expr),
    Declare(DeclKind, Vec<(String, Option<Expr>)>),
    Block(Vec<Stmt>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        kind: ForEachKind,
        decl: Option<DeclKind>,
        name: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Empty,
}

/// What an output slot appends when it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Literal(String),
    Escaped(Expr),
    Raw(Expr),
    Unguarded(Expr),
}
