use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};

static REGISTER_METRICS: Once = Once::new();

/// Label carrying the `<keyspace>.<table>` a metric refers to.
pub const TABLE_LABEL: &str = "table";

/// Label carrying the consistency level a read-back succeeded at.
pub const CONSISTENCY_LABEL: &str = "consistency";

pub const RELAY_NOTICES_EMITTED_TOTAL: &str = "relay_notices_emitted_total";
pub const RELAY_NOTICES_DUPLICATE_TOTAL: &str = "relay_notices_duplicate_total";
pub const RELAY_NOTICES_DROPPED_TOTAL: &str = "relay_notices_dropped_total";
pub const RELAY_READ_CONSISTENCY_DOWNGRADES_TOTAL: &str =
    "relay_read_consistency_downgrades_total";
pub const RELAY_SCHEMA_DEGRADED: &str = "relay_schema_degraded";

/// Registers the metrics emitted by the relay. Safe to call more than once.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            RELAY_NOTICES_EMITTED_TOTAL,
            Unit::Count,
            "Change notices reconciled and emitted to the event log"
        );

        describe_counter!(
            RELAY_NOTICES_DUPLICATE_TOTAL,
            Unit::Count,
            "Change notices skipped because their digest was already processed"
        );

        describe_counter!(
            RELAY_NOTICES_DROPPED_TOTAL,
            Unit::Count,
            "Change notices dropped because they could not be reconciled"
        );

        describe_counter!(
            RELAY_READ_CONSISTENCY_DOWNGRADES_TOTAL,
            Unit::Count,
            "Read-backs that succeeded below the strongest configured consistency level"
        );

        describe_gauge!(
            RELAY_SCHEMA_DEGRADED,
            Unit::Count,
            "Set to 1 while the watched table has no usable schema binding"
        );
    });
}
