// Health module - host and cluster assessment

pub mod check;
pub mod cluster;
pub mod host;

use serde::Serialize;

use crate::error::AppResult;

/// One independently collected piece of host data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Facet<T> {
    Collected(T),
    Failed(String),
    NotAttempted,
}

impl<T> Default for Facet<T> {
    fn default() -> Self {
        Facet::NotAttempted
    }
}

impl<T> Facet<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Facet::Collected(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_collected(&self) -> bool {
        matches!(self, Facet::Collected(_))
    }
}

impl<T> From<AppResult<T>> for Facet<T> {
    fn from(result: AppResult<T>) -> Self {
        match result {
            Ok(value) => Facet::Collected(value),
            Err(e) => Facet::Failed(e.to_string()),
        }
    }
}

macro_rules! error_flags {
    (
        $(#[$meta:meta])*
        $name:ident { $($flag:ident = $bit:expr => $text:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
        #[serde(transparent)]
        pub struct $name(u8);

        impl $name {
            $(pub const $flag: $name = $name($bit);)+

            const ALL: &'static [($name, &'static str)] = &[$(($name::$flag, $text)),+];

            pub fn insert(&mut self, other: $name) {
                self.0 |= other.0;
            }

            pub fn contains(&self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn is_empty(&self) -> bool {
                self.0 == 0
            }

            /// Operator-facing text for each set flag
            pub fn descriptions(&self) -> Vec<&'static str> {
                Self::ALL
                    .iter()
                    .filter(|(flag, _)| self.contains(*flag))
                    .map(|(_, text)| *text)
                    .collect()
            }
        }
    };
}

error_flags! {
    /// Per-host failures, one flag per facet
    HostErrors {
        CONNECT = 0x01 => "could not connect to host",
        OS = 0x02 => "could not retrieve OS information",
        LOGICAL_INTERFACES = 0x04 => "could not retrieve logical interface",
        PHYSICAL_INTERFACES = 0x08 => "could not retrieve physical interface",
        ROUTES = 0x10 => "could not retrieve routes",
        HA = 0x20 => "could not retrieve CPHA information",
    }
}

error_flags! {
    /// Cluster-level disagreements between the two members
    ClusterErrors {
        ROUTE_MISMATCH = 0x01 => "routes do not match on cluster members",
        HA_INCONSISTENT = 0x02 => "CPHA not working",
    }
}

#[cfg(test)]
pub(crate) mod mock;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_flags() {
        let mut errors = HostErrors::default();
        assert!(errors.is_empty());

        errors.insert(HostErrors::ROUTES);
        errors.insert(HostErrors::HA);
        assert!(errors.contains(HostErrors::ROUTES));
        assert!(!errors.contains(HostErrors::OS));
        assert_eq!(serde_json::to_value(errors).unwrap(), 0x30);
        assert_eq!(
            errors.descriptions(),
            vec!["could not retrieve routes", "could not retrieve CPHA information"]
        );
    }

    #[test]
    fn test_facet_from_result() {
        let ok: Facet<u32> = Ok(3).into();
        assert_eq!(ok.value(), Some(&3));

        let failed: Facet<u32> = Err(AppError::query("routes", "boom")).into();
        assert!(matches!(failed, Facet::Failed(ref reason) if reason == "Failed to query routes: boom"));
        assert_eq!(failed.value(), None);

        assert!(!Facet::<u32>::default().is_collected());
    }
}
