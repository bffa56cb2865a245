pub mod depreciation;
pub mod macrs;
