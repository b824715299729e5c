use crate::prelude::*;

use crate::core::{check_query, MetricSource, RunState, SourceState};
use chrono::{TimeZone, Utc};
use libc::statvfs;
use std::sync::Mutex;
use sysinfo::{
    CpuExt, CpuRefreshKind, Pid, ProcessExt, ProcessRefreshKind, RefreshKind, System, SystemExt,
};

pub const TOTAL_RAM: &str = "total_ram";
pub const USED_RAM: &str = "used_ram";
pub const AVAILABLE_RAM: &str = "available_ram";
pub const USED_SWAP: &str = "used_swap";
pub const CPU_LOAD: &str = "cpu_load";
pub const HOST_CPU_LOAD: &str = "host_cpu_load";
pub const PROCESS_RAM: &str = "process_ram";
pub const PROCESS_VIRTUAL_RAM: &str = "process_virtual_ram";
pub const LOAD_AVERAGE_1M: &str = "load_average_1m";
pub const DESCRIPTORS_AMOUNT: &str = "descr_amount";
pub const TOTAL_SPACE: &str = "total_space";
pub const USED_SPACE: &str = "used_space";
pub const FREE_SPACE: &str = "free_space";
pub const BOOT_TIME: &str = "boot_time";

const SPACE_MOUNT_POINT: &str = "/";

/// Host and own-process counters read through `sysinfo`.
pub struct OsSource {
    address: Address,
    inner: Mutex<OsState>,
    state: RunState,
}

struct OsState {
    sys: System,
    pid: Option<Pid>,
    descr: DescrCounter,
}

impl OsSource {
    pub fn new(address: impl Into<Address>) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("can't determine current process pid: {}", e);
                None
            }
        };
        Self {
            address: address.into(),
            inner: Mutex::new(OsState {
                sys: System::new(),
                pid,
                descr: DescrCounter::new(),
            }),
            state: RunState::new(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, OsState>, Error> {
        self.inner
            .lock()
            .map_err(|_| Error::source_failed(&self.address, "system state lock poisoned"))
    }

    fn refresh(state: &mut OsState) {
        state.sys.refresh_specifics(
            RefreshKind::new()
                .with_memory()
                .with_cpu(CpuRefreshKind::new().with_cpu_usage()),
        );
        if let Some(pid) = state.pid {
            state
                .sys
                .refresh_process_specifics(pid, ProcessRefreshKind::new().with_cpu());
        }
    }

    fn value(state: &mut OsState, id: &str) -> Option<PropertyValue> {
        let sys = &state.sys;
        let value = match id {
            TOTAL_RAM => integer(sys.total_memory()),
            USED_RAM => integer(sys.total_memory().saturating_sub(sys.available_memory())),
            AVAILABLE_RAM => integer(sys.available_memory()),
            USED_SWAP => integer(sys.used_swap()),
            HOST_CPU_LOAD => PropertyValue::Float(sys.global_cpu_info().cpu_usage() as f64),
            LOAD_AVERAGE_1M => PropertyValue::Float(sys.load_average().one),
            CPU_LOAD | PROCESS_RAM | PROCESS_VIRTUAL_RAM => {
                let proc = state.pid.and_then(|pid| sys.process(pid))?;
                match id {
                    CPU_LOAD => PropertyValue::Float(proc.cpu_usage() as f64),
                    PROCESS_RAM => integer(proc.memory()),
                    _ => integer(proc.virtual_memory()),
                }
            }
            DESCRIPTORS_AMOUNT => integer(state.descr.descr_amount()?),
            TOTAL_SPACE | USED_SPACE | FREE_SPACE => {
                let space = DiskSpace::of(SPACE_MOUNT_POINT)?;
                match id {
                    TOTAL_SPACE => integer(space.total),
                    USED_SPACE => integer(space.used),
                    _ => integer(space.free),
                }
            }
            BOOT_TIME => {
                let secs = i64::try_from(sys.boot_time()).ok()?;
                PropertyValue::Timestamp(Utc.timestamp_opt(secs, 0).single()?)
            }
            _ => return None,
        };
        Some(value)
    }
}

fn integer(value: u64) -> PropertyValue {
    PropertyValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

impl Debug for OsSource {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("OsSource")
            .field("address", &self.address)
            .field("state", &self.state.get())
            .finish()
    }
}

#[async_trait]
impl MetricSource for OsSource {
    fn address(&self) -> &Address {
        &self.address
    }

    fn state(&self) -> SourceState {
        self.state.get()
    }

    async fn start(&self) -> Result<(), Error> {
        if self.state.start() {
            let mut state = self.lock()?;
            Self::refresh(&mut state);
            debug!(
                "{} started, total mem in bytes: {}",
                self.address,
                state.sys.total_memory()
            );
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), Error> {
        self.state.set(SourceState::Stopped);
        Ok(())
    }

    async fn query(&self, definitions: &[MetricDefinition]) -> Result<Vec<Property>, Error> {
        check_query(&self.address, self.state.get(), definitions)?;
        let mut state = self.lock()?;
        Self::refresh(&mut state);
        let mut props = Vec::with_capacity(definitions.len());
        for def in definitions {
            match Self::value(&mut state, def.id().as_str()) {
                Some(value) => props.push(Property::for_definition(def, value)),
                None => warn!("{}: metric {} is not available", self.address, def.id()),
            }
        }
        Ok(props)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct DiskSpace {
    total: u64,
    used: u64,
    free: u64,
}

impl DiskSpace {
    fn of(mount_point: &str) -> Option<Self> {
        let mut cpath = mount_point.as_bytes().to_vec();
        cpath.push(0);
        let stat = unsafe {
            let mut stat: statvfs = std::mem::zeroed();
            if statvfs(cpath.as_ptr() as *const _, &mut stat) != 0 {
                return None;
            }
            stat
        };
        let frsize = stat.f_frsize as u64;
        let blocks = stat.f_blocks as u64;
        Some(Self {
            total: frsize * blocks,
            used: frsize * blocks.saturating_sub(stat.f_bfree as u64),
            free: frsize * stat.f_bavail as u64,
        })
    }
}

// descriptors are recounted on every `CACHED_TIMES`-th call, cached value is returned otherwise
const CACHED_TIMES: usize = 10;

struct DescrCounter {
    value: Option<u64>,
    cached_times: usize,
}

impl DescrCounter {
    fn new() -> Self {
        DescrCounter {
            value: None,
            cached_times: 0,
        }
    }

    fn descr_amount(&mut self) -> Option<u64> {
        if self.cached_times == 0 {
            self.cached_times = CACHED_TIMES;
            self.value = Self::count_descriptors();
        } else {
            self.cached_times -= 1;
        }
        self.value
    }

    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            fn count_descriptors() -> Option<u64> {
                const DESCRS_DIR: &str = "/proc/self/fd/";
                match std::fs::read_dir(DESCRS_DIR) {
                    Ok(entries) => Some(entries.count() as u64),
                    Err(e) => {
                        debug!("can't read {}: {}", DESCRS_DIR, e);
                        None
                    }
                }
            }
        } else {
            fn count_descriptors() -> Option<u64> {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_metrics_are_returned_in_order() {
        let source = OsSource::new("os://localhost");
        source.start().await.unwrap();
        let defs = [
            MetricDefinition::new(TOTAL_RAM, "os://localhost").with_unit("bytes"),
            MetricDefinition::new("no_such_metric", "os://localhost"),
            MetricDefinition::new(LOAD_AVERAGE_1M, "os://localhost"),
        ];
        let props = source.query(&defs).await.unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].name(), TOTAL_RAM);
        assert_eq!(props[0].unit(), Some("bytes"));
        assert_eq!(props[1].name(), LOAD_AVERAGE_1M);
    }

    #[tokio::test]
    async fn test_query_before_start_fails() {
        let source = OsSource::new("os://localhost");
        let defs = [MetricDefinition::new(TOTAL_RAM, "os://localhost")];
        assert!(source.query(&defs).await.is_err());
    }
}
