#![forbid(unsafe_code)]

mod admission;
mod budget;
mod environment;

pub use admission::{
    AdmissionContext, AdmissionDecision, AdmissionPolicy, DefaultAdmissionPolicy, RejectReason,
};
pub use budget::ByteBudget;
pub use environment::{Environment, StaticEnvironment};
