// Each wire format is an independent forward/reverse pair
mod format;
mod logic;
mod search;

pub use format::{LogicDsl, OutputMode, PersistedValue, SearchDsl, Translated, Translator, WireFormat};
pub use logic::{LogicExpression, Operand, from_logic_expression, to_logic_expression};
pub use search::{
    BoolClause, Clause, RangeBounds, SearchFilter, from_search_filter, to_search_filter,
};
