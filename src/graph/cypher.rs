//! Cypher RETURN clause column extraction.
//!
//! Apache AGE needs the SQL column list of `cypher(...)` to match the
//! statement's RETURN clause. The grammar in `cypher.pest` only understands
//! enough Cypher to find the final RETURN projection.
//!
//! ```
//! use distributor::graph::extract_return_columns;
//!
//! let columns = extract_return_columns("MATCH (n) RETURN n.name AS name, n.age").unwrap();
//! assert_eq!(columns, vec!["name", "n.age"]);
//! ```

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "graph/cypher.pest"]
struct CypherParser;

/// Extracts column names from a statement's final RETURN clause.
///
/// Aliased items (`expr AS alias`) yield the alias, others the expression text.
pub fn extract_return_columns(query: &str) -> Result<Vec<String>, ParseError> {
    let pairs = CypherParser::parse(Rule::Cypher, query)
        .map_err(|e| ParseError::InvalidSyntax(e.to_string()))?;

    let mut columns = Vec::new();
    collect_final_return(pairs, &mut columns)?;

    if columns.is_empty() {
        return Err(ParseError::NoReturnClause);
    }
    Ok(columns)
}

fn collect_final_return(pairs: Pairs<Rule>, columns: &mut Vec<String>) -> Result<(), ParseError> {
    for pair in pairs {
        match pair.as_rule() {
            Rule::Return => {
                // Later RETURNs (after UNION or a subquery) replace earlier ones
                columns.clear();
                for inner in pair.into_inner() {
                    if inner.as_rule() == Rule::ProjectionItems {
                        collect_items(inner, columns)?;
                    }
                }
            }
            _ => collect_final_return(pair.into_inner(), columns)?,
        }
    }
    Ok(())
}

fn collect_items(items: Pair<Rule>, columns: &mut Vec<String>) -> Result<(), ParseError> {
    for item in items.into_inner() {
        match item.as_rule() {
            Rule::Star => return Err(ParseError::ReturnStarNotSupported),
            Rule::ProjectionItem => columns.push(column_name(item)),
            _ => {}
        }
    }
    Ok(())
}

fn column_name(item: Pair<Rule>) -> String {
    let mut expression = "";
    for part in item.into_inner() {
        match part.as_rule() {
            Rule::Alias => return part.as_str().trim_matches('`').to_string(),
            Rule::Expression => expression = part.as_str(),
            _ => {}
        }
    }
    expression.trim().to_string()
}

/// Errors from RETURN column extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Write-only statement without RETURN.
    #[error("statement has no RETURN clause")]
    NoReturnClause,
    #[error("RETURN * is not supported")]
    ReturnStarNotSupported,
    #[error("invalid Cypher: {0}")]
    InvalidSyntax(String),
}
