#![forbid(unsafe_code)]

use crate::domain::NetworkQuality;
use config::Config;

/// Environment conditions an admission check is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionContext {
    pub network: NetworkQuality,
    pub data_saver: bool,
    pub bytes_used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    DataSaver,
    NetworkTooSlow {
        actual: NetworkQuality,
        minimum: NetworkQuality,
    },
    BudgetExhausted {
        used: u64,
        cap: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admit,
    Reject { reason: RejectReason },
}

impl AdmissionDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, AdmissionDecision::Admit)
    }
}

pub trait AdmissionPolicy: Send + Sync {
    /// Decide whether prefetching may proceed under `context`.
    fn decide(&self, context: &AdmissionContext) -> AdmissionDecision;

    fn should_admit(&self, context: &AdmissionContext) -> bool {
        self.decide(context).is_admit()
    }
}

#[derive(Debug, Clone)]
pub struct DefaultAdmissionPolicy {
    respect_data_saver: bool,
    min_quality: NetworkQuality,
    byte_cap: u64,
}

impl DefaultAdmissionPolicy {
    pub fn new(config: &Config) -> Self {
        Self {
            respect_data_saver: config.policy.respect_data_saver,
            min_quality: config.policy.min_network_quality,
            byte_cap: config.policy.byte_budget,
        }
    }
}

impl AdmissionPolicy for DefaultAdmissionPolicy {
    fn decide(&self, context: &AdmissionContext) -> AdmissionDecision {
        if self.respect_data_saver && context.data_saver {
            return AdmissionDecision::Reject {
                reason: RejectReason::DataSaver,
            };
        }
        if !context.network.meets(self.min_quality) {
            return AdmissionDecision::Reject {
                reason: RejectReason::NetworkTooSlow {
                    actual: context.network,
                    minimum: self.min_quality,
                },
            };
        }
        if context.bytes_used >= self.byte_cap {
            return AdmissionDecision::Reject {
                reason: RejectReason::BudgetExhausted {
                    used: context.bytes_used,
                    cap: self.byte_cap,
                },
            };
        }
        AdmissionDecision::Admit
    }
}
