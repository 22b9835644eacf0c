//! Target runtime versions used to gate rules.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Runtime version an assembly was compiled against.
///
/// Rules may declare a minimum runtime (for example a check that relies on generic
/// instantiations needs 2.0); the rule registry skips rules whose minimum is newer than the
/// assembly being checked. Variants are ordered oldest to newest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum TargetRuntime {
    /// .NET Framework 1.0
    #[strum(serialize = "1.0")]
    #[serde(rename = "1.0")]
    V1_0,
    /// .NET Framework 1.1
    #[strum(serialize = "1.1")]
    #[serde(rename = "1.1")]
    V1_1,
    /// .NET Framework 2.0 - 3.5
    #[strum(serialize = "2.0")]
    #[serde(rename = "2.0")]
    V2_0,
    /// .NET Framework 4.x and .NET Core
    #[default]
    #[strum(serialize = "4.0")]
    #[serde(rename = "4.0")]
    V4_0,
}
