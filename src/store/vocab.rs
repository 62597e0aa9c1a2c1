//! Labels and relationship types of the catalog graph.

// Node labels
pub const BUSINESS_ENTITY: &str = "BusinessEntity";
pub const OFFERING: &str = "Offering";
pub const TYPE_AND_QUANTITY_NODE: &str = "TypeAndQuantityNode";
pub const PRODUCT: &str = "Product";
pub const PRODUCT_GROUP: &str = "ProductGroup";

// Relationship types
/// Offering -> BusinessEntity. The only relationship this service writes.
pub const AVAILABLE_AT_OR_FROM: &str = "AVAILABLE_AT_OR_FROM";
/// BusinessEntity -> ProductGroup exclusion rule.
pub const DISALLOWED_PRODUCT_GROUP: &str = "DISALLOWED_PRODUCT_GROUP";
/// Offering -> TypeAndQuantityNode.
pub const INCLUDES_OBJECT: &str = "INCLUDES_OBJECT";
/// TypeAndQuantityNode -> Product.
pub const TYPE_OF_GOOD: &str = "TYPE_OF_GOOD";
/// ProductGroup -> Product.
pub const HAS_PRODUCT: &str = "HAS_PRODUCT";
/// ProductGroup -> parent ProductGroup.
pub const BROADER: &str = "BROADER";

pub const NODE_LABELS: [&str; 5] = [
    BUSINESS_ENTITY,
    OFFERING,
    TYPE_AND_QUANTITY_NODE,
    PRODUCT,
    PRODUCT_GROUP,
];

pub const EDGE_TYPES: [&str; 6] = [
    AVAILABLE_AT_OR_FROM,
    DISALLOWED_PRODUCT_GROUP,
    INCLUDES_OBJECT,
    TYPE_OF_GOOD,
    HAS_PRODUCT,
    BROADER,
];
