//! Readers for each hardware domain and the metric names they publish.
//!
//! The names and label keys below are consumed verbatim by dashboards; renaming
//! any of them is a breaking change.

use crate::domain::MetricKind;

pub mod board_info;
pub mod cpu_frequency;
pub mod cpu_usage;
pub mod disk;
pub mod fan;
pub mod gpu;
pub mod memory_usage;
pub mod power;
pub mod power_mode;
pub mod temperature;
pub mod uptime;

pub const UPTIME: &str = "jetson_uptime";
pub const BOARD_INFO: &str = "jetson_info_board_info";
pub const POWER_MODE: &str = "jetson_nvpmode_info";
pub const CPU_USAGE: &str = "jetson_usage_cpu";
pub const CPU_FREQUENCY: &str = "jetson_cpu_frequency_hertz";
pub const GPU_USAGE: &str = "jetson_usage_gpu";
pub const RAM_USAGE: &str = "jetson_usage_ram";
pub const SWAP_USAGE: &str = "jetson_usage_swap";
pub const DISK_USAGE: &str = "jetson_usage_disk";
pub const FAN_USAGE: &str = "jetson_usage_fan";
pub const TEMPERATURES: &str = "jetson_temperatures";
pub const POWER: &str = "jetson_usage_power";
pub const VOLTAGE: &str = "jetson_usage_voltage_levels";
pub const CURRENT: &str = "jetson_usage_current_values";

#[derive(Debug)]
pub struct Family {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

pub const FAMILIES: &[Family] = &[
    Family {
        name: UPTIME,
        help: "System uptime",
        kind: MetricKind::Gauge,
        labels: &["uptime"],
    },
    Family {
        name: BOARD_INFO,
        help: "Board sys info",
        kind: MetricKind::Gauge,
        labels: &[
            "board_info",
            "codename",
            "l4t",
            "distribution",
            "jetpack",
            "machine",
            "release",
            "module",
            "soc",
            "serial_number",
        ],
    },
    Family {
        name: POWER_MODE,
        help: "NV power mode",
        kind: MetricKind::Gauge,
        labels: &["nvpmode", "mode"],
    },
    Family {
        name: CPU_USAGE,
        help: "CPU utilization percentage per core",
        kind: MetricKind::Gauge,
        labels: &["cpu"],
    },
    Family {
        name: CPU_FREQUENCY,
        help: "Current CPU frequency per core",
        kind: MetricKind::Gauge,
        labels: &["cpu"],
    },
    Family {
        name: GPU_USAGE,
        help: "GPU utilization percentage",
        kind: MetricKind::Gauge,
        labels: &["gpu"],
    },
    Family {
        name: RAM_USAGE,
        help: "Memory usage in bytes",
        kind: MetricKind::Gauge,
        labels: &["ram"],
    },
    Family {
        name: SWAP_USAGE,
        help: "Swap usage in bytes",
        kind: MetricKind::Gauge,
        labels: &["swap"],
    },
    Family {
        name: DISK_USAGE,
        help: "Disk space usage in bytes",
        kind: MetricKind::Gauge,
        labels: &["disk"],
    },
    Family {
        name: FAN_USAGE,
        help: "Fan usage",
        kind: MetricKind::Gauge,
        labels: &["fan"],
    },
    Family {
        name: TEMPERATURES,
        help: "Sensor temperatures in degrees Celsius",
        kind: MetricKind::Gauge,
        labels: &["temperature"],
    },
    Family {
        name: POWER,
        help: "Power usage per rail in milliwatts",
        kind: MetricKind::Gauge,
        labels: &["power"],
    },
    Family {
        name: VOLTAGE,
        help: "Voltage per rail in millivolts",
        kind: MetricKind::Gauge,
        labels: &["voltage"],
    },
    Family {
        name: CURRENT,
        help: "Current per rail in milliamperes",
        kind: MetricKind::Gauge,
        labels: &["current"],
    },
];

pub fn family(name: &str) -> Option<&'static Family> {
    FAMILIES.iter().find(|f| f.name == name)
}

/// Kernel CPU indices start at 0, the published labels at `cpu_1`.
pub fn core_label(core: usize) -> String {
    format!("cpu_{}", core + 1)
}

pub(crate) fn percentage(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }

    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_family_names_are_unique() {
        let names = FAMILIES.iter().map(|f| f.name).collect::<HashSet<_>>();
        assert_eq!(names.len(), FAMILIES.len());
    }

    #[test]
    fn test_core_labels_are_one_based() {
        assert_eq!(core_label(0), "cpu_1");
        assert_eq!(core_label(7), "cpu_8");
    }

    #[test]
    fn test_percentage_is_clamped() {
        assert_eq!(percentage(-3.0), 0.0);
        assert_eq!(percentage(42.5), 42.5);
        assert_eq!(percentage(180.0), 100.0);
        assert_eq!(percentage(f64::NAN), 0.0);
    }
}
