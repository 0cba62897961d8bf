pub mod codec;
pub mod paginate;
pub mod sort;

pub use codec::{
    DEFAULT_PAGE, FieldType, PAGE_FIELD, PAGE_SIZE_FIELD, QueryCodec, QueryValue, TypeMap,
    TypedQuery, UnknownFieldPolicy, decode, encode, escape_component,
};
pub use paginate::Pagination;
pub use sort::{SortField, SortKey, SortSpec, SortValue, compare_by, multi_sort};
