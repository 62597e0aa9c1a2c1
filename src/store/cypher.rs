//! [`LinkStore`] over any Cypher [`GraphClient`].
//!
//! Patterns are rendered in two stages: first the business population is
//! bound, then offerings are matched against it. For constrained businesses
//! the first stage is a plain MATCH on the `DISALLOWED_PRODUCT_GROUP` edge, so
//! the exclusion path below is only ever evaluated for businesses that have
//! rules at all.

use async_trait::async_trait;

use crate::error::AppError;
use crate::graph::{GraphClient, QueryExt, Transaction};
use crate::store::pattern::{BusinessScope, Edit, Exclusion, LinkPattern, LinkState, Mutation};
use crate::store::vocab::{
    AVAILABLE_AT_OR_FROM, BROADER, BUSINESS_ENTITY, DISALLOWED_PRODUCT_GROUP, HAS_PRODUCT,
    INCLUDES_OBJECT, OFFERING, PRODUCT_GROUP, TYPE_OF_GOOD,
};
use crate::store::LinkStore;

/// Cypher-backed link store.
#[derive(Clone)]
pub struct CypherLinkStore<C> {
    client: C,
}

impl<C: GraphClient> CypherLinkStore<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: GraphClient> LinkStore for CypherLinkStore<C> {
    async fn ask(&self, pattern: &LinkPattern) -> Result<bool, AppError> {
        let statement = render_ask(pattern);
        let row = self.client.query(&statement).fetch_one().await?;
        Ok(row.is_some())
    }

    async fn mutate(&self, mutation: &Mutation) -> Result<usize, AppError> {
        let statement = render_mutation(mutation);
        let txn = self.client.begin().await?;

        // The count is decoded before COMMIT so a bad row rolls the batch back
        let outcome = match txn.query(&statement).fetch_one().await {
            Ok(Some(row)) => row.get::<usize>("affected"),
            Ok(None) => Ok(0),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(affected) => {
                txn.commit().await?;
                Ok(affected)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback after failed mutation failed");
                }
                Err(e)
            }
        }
    }
}

/// Existence probe: one row back iff the pattern has a match.
pub fn render_ask(pattern: &LinkPattern) -> String {
    format!("{}\nRETURN 1 AS hit\nLIMIT 1", render_selection(pattern))
}

/// Bounded rewrite of the pairs selected by the mutation's pattern.
pub fn render_mutation(mutation: &Mutation) -> String {
    let selection = render_selection(&mutation.selection);
    let bound = format!(
        "WITH DISTINCT offering, business\nLIMIT {}",
        mutation.limit.get()
    );
    let rewrite = match mutation.edit {
        Edit::Insert => format!(
            "MERGE (offering)-[:{AVAILABLE_AT_OR_FROM}]->(business)\nRETURN count(*) AS affected"
        ),
        Edit::Delete => format!(
            "MATCH (offering)-[link:{AVAILABLE_AT_OR_FROM}]->(business)\n\
             DELETE link\n\
             WITH DISTINCT offering, business\n\
             RETURN count(*) AS affected"
        ),
    };
    format!("{selection}\n{bound}\n{rewrite}")
}

/// MATCH/WHERE clauses binding `offering` and `business` for a pattern.
pub fn render_selection(pattern: &LinkPattern) -> String {
    let rule_edge = format!("(business)-[:{DISALLOWED_PRODUCT_GROUP}]->(:{PRODUCT_GROUP})");

    let mut lines = match pattern.business {
        BusinessScope::Constrained => vec![
            format!(
                "MATCH (business:{BUSINESS_ENTITY})-[:{DISALLOWED_PRODUCT_GROUP}]->(:{PRODUCT_GROUP})"
            ),
            "WITH DISTINCT business".to_string(),
        ],
        BusinessScope::Unconstrained => vec![
            format!("MATCH (business:{BUSINESS_ENTITY})"),
            format!("WHERE NOT EXISTS({rule_edge})"),
        ],
    };

    // Stale links into unconstrained businesses are removed whatever their source node
    let offering = match pattern.business {
        BusinessScope::Constrained => format!("(offering:{OFFERING})"),
        BusinessScope::Unconstrained => "(offering)".to_string(),
    };

    let mut conditions = Vec::new();
    match pattern.link {
        LinkState::Present => {
            lines.push(format!(
                "MATCH {offering}-[:{AVAILABLE_AT_OR_FROM}]->(business)"
            ));
        }
        LinkState::Absent => {
            lines.push(format!("MATCH (offering:{OFFERING})"));
            conditions.push(format!(
                "NOT EXISTS((offering)-[:{AVAILABLE_AT_OR_FROM}]->(business))"
            ));
        }
    }

    match pattern.exclusion {
        Exclusion::Any => {}
        Exclusion::Excluded => conditions.push(format!("EXISTS({})", exclusion_path())),
        Exclusion::Allowed => conditions.push(format!("NOT EXISTS({})", exclusion_path())),
    }

    if !conditions.is_empty() {
        lines.push(format!("WHERE {}", conditions.join("\n  AND ")));
    }

    lines.join("\n")
}

/// Offering -> product -> group (-> parent group)? <- business rule.
///
/// Interior nodes stay anonymous so the path is valid as an `EXISTS(...)`
/// pattern predicate.
fn exclusion_path() -> String {
    format!(
        "(offering)-[:{INCLUDES_OBJECT}]->()-[:{TYPE_OF_GOOD}]->()\
         <-[:{HAS_PRODUCT}]-(:{PRODUCT_GROUP})-[:{BROADER}*0..1]->(:{PRODUCT_GROUP})\
         <-[:{DISALLOWED_PRODUCT_GROUP}]-(business)"
    )
}
