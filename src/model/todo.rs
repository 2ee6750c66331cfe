use super::{Column, ColumnKind, Entity, EntitySchema, Literal, Stamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Todo {
    pub id: i64,
    pub utc_created: DateTime<Utc>,
    pub utc_updated: DateTime<Utc>,
    pub completed: bool,
    pub title: String,
}

const COLUMNS: &[Column] = &[
    Column::new("id", ColumnKind::Integer).primary_key(),
    Column::new("utc_created", ColumnKind::Timestamp).stamp(Stamp::Created),
    Column::new("utc_updated", ColumnKind::Timestamp).stamp(Stamp::Updated),
    Column::new("completed", ColumnKind::Boolean).default(Literal::Bool(false)),
    Column::new("title", ColumnKind::Text)
        .required()
        .non_blank()
        .indexed(),
];

static SCHEMA: EntitySchema = EntitySchema {
    table: "todo",
    path_segment: "todo",
    columns: COLUMNS,
};

impl Entity for Todo {
    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }
}

impl fmt::Display for Todo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let completed = if self.completed { "completed" } else { "not completed" };
        write!(f, "<Todo: \"{}\" ({})>", self.title, completed)
    }
}
