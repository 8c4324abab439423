mod community;
mod hijack;
mod rule;
mod update;

pub use community::{Community, CommunityList};
pub use hijack::{EndTag, HijackRecord};
pub use rule::{AnnotationRule, AsnSet, CommunityRule, ConfiguredRule, Policy, PrefixNode};
pub use update::{PriorHijack, RouteUpdate, UpdateType, IMPLICIT_WITHDRAWAL_SERVICE};
