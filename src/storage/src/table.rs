use anyhow::Result;
use async_trait::async_trait;
use labels::Repository;
use serde_json::Value;
use sqlx::{
    any::AnyArguments,
    query::Query,
    Any, AnyPool,
};
use tracing::debug;
use types::Filter;

use crate::{
    filter::{self, quote_identifier, Param},
    row::decode_column,
    Dialect,
};

/// A collection backed by a table of the same name.
pub struct Table {
    pub(crate) pool: AnyPool,
    pub(crate) dialect: Dialect,
    pub(crate) name: String,
}

#[async_trait]
impl Repository for Table {
    async fn sum(&self, field: &str, filter: &Filter) -> Result<Option<Value>> {
        let column = quote_identifier(field)?;
        let aggregate = match self.dialect {
            Dialect::Sqlite => format!("SUM({})", column),
            // MySQL 的 SUM 返回 DECIMAL，Any 驱动无法解码
            Dialect::Mysql => format!("CAST(SUM({}) AS DOUBLE)", column),
        };
        let mut sql = format!(
            "SELECT {} AS sum FROM {}",
            aggregate,
            quote_identifier(&self.name)?
        );

        let predicate = filter::compile(filter.as_value())?;
        let params = match predicate {
            Some(predicate) => {
                sql.push_str(" WHERE ");
                sql.push_str(&predicate.clause);
                predicate.params
            }
            None => vec![],
        };
        debug!("{}", sql);

        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind(query, param);
        }
        let row = query.fetch_one(&self.pool).await?;
        match decode_column(&row, 0)? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }
}

fn bind<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    param: Param,
) -> Query<'q, Any, AnyArguments<'q>> {
    match param {
        Param::Bool(b) => query.bind(b),
        Param::Int(i) => query.bind(i),
        Param::Float(f) => query.bind(f),
        Param::Text(s) => query.bind(s),
    }
}
