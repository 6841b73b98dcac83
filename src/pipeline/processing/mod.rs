// Pipeline processing: the reconciliation stages, leaves first

pub mod normalize;
pub mod tat;
pub mod split;
pub mod linkage;
pub mod identity;
pub mod integrity;
