//! Statically declared entity schemas. The CRUD mapper, SQL builder and DDL all work from
//! these descriptions.

mod todo;

pub use todo::Todo;

use serde_json::Value;

/// Storage type of a column; drives SQL types, payload checks and row decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Boolean,
    Text,
    Timestamp,
}

impl ColumnKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Boolean => "BOOLEAN",
            ColumnKind::Text => "TEXT",
            ColumnKind::Timestamp => "DATETIME",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "an integer",
            ColumnKind::Boolean => "a boolean",
            ColumnKind::Text => "a string",
            ColumnKind::Timestamp => "an RFC 3339 timestamp",
        }
    }
}

/// Constant default applied on create when the payload omits the column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Text(&'static str),
}

impl Literal {
    pub fn to_json(self) -> Value {
        match self {
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(n) => Value::Number(n.into()),
            Literal::Text(s) => Value::String(s.to_string()),
        }
    }

    fn sql(self) -> String {
        match self {
            Literal::Bool(b) => {
                if b {
                    "1".into()
                } else {
                    "0".into()
                }
            }
            Literal::Int(n) => n.to_string(),
            Literal::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

/// Server-maintained timestamp columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stamp {
    /// Set once on insert.
    Created,
    /// Set on insert and refreshed on every update.
    Updated,
}

#[derive(Clone, Copy, Debug)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub primary_key: bool,
    pub nullable: bool,
    /// Must be supplied on create.
    pub required: bool,
    /// Strings must contain a non-whitespace character.
    pub non_blank: bool,
    /// Clients may never write this column.
    pub immutable: bool,
    pub indexed: bool,
    pub default: Option<Literal>,
    pub stamp: Option<Stamp>,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Column {
            name,
            kind,
            primary_key: false,
            nullable: false,
            required: false,
            non_blank: false,
            immutable: false,
            indexed: false,
            default: None,
            stamp: None,
        }
    }

    /// Store-generated integer key; implies immutable.
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.immutable = true;
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn non_blank(mut self) -> Self {
        self.non_blank = true;
        self
    }

    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub const fn default(mut self, value: Literal) -> Self {
        self.default = Some(value);
        self
    }

    /// `Stamp::Created` columns are immutable; `Stamp::Updated` ones are overwritten server-side.
    pub const fn stamp(mut self, stamp: Stamp) -> Self {
        self.stamp = Some(stamp);
        if matches!(stamp, Stamp::Created) {
            self.immutable = true;
        }
        self
    }

    /// Column definition for CREATE TABLE.
    pub fn ddl(&self) -> String {
        let mut def = format!("\"{}\" {}", self.name, self.kind.sql_type());
        if self.primary_key {
            def.push_str(" PRIMARY KEY AUTOINCREMENT");
            return def;
        }
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(d) = self.default {
            def.push_str(" DEFAULT ");
            def.push_str(&d.sql());
        }
        if self.non_blank {
            def.push_str(&format!(" CHECK (length(trim(\"{}\")) > 0)", self.name));
        }
        def
    }
}

/// Table-level description of one entity exposed over REST.
#[derive(Debug)]
pub struct EntitySchema {
    pub table: &'static str,
    /// URL segment of the collection endpoint (`/<path_segment>`).
    pub path_segment: &'static str,
    pub columns: &'static [Column],
}

impl EntitySchema {
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        let columns: &'static [Column] = self.columns;
        columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> &'static Column {
        let columns: &'static [Column] = self.columns;
        columns
            .iter()
            .find(|c| c.primary_key)
            .unwrap_or(&columns[0])
    }

    pub fn stamped(&self, stamp: Stamp) -> Option<&'static Column> {
        let columns: &'static [Column] = self.columns;
        columns.iter().find(|c| c.stamp == Some(stamp))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> {
        let columns: &'static [Column] = self.columns;
        columns.iter().map(|c| c.name)
    }
}

/// Implemented by every type the resource mapper can expose.
pub trait Entity: Send + Sync + 'static {
    fn schema() -> &'static EntitySchema;
}
