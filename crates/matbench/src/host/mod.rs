//! Host backend: runs the `matrix_mult` contract on the CPU.
//!
//! Stands in for an accelerator when no OpenCL runtime is present, and gives
//! tests a device whose every object is accounted for (see
//! [`ResourceLedger`]) and whose failures can be injected (see [`FaultPlan`]).
//! Launch semantics follow the kernel contract: a 2D index space of
//! `{rows, column groups}` where each work-item writes `n_works` adjacent
//! output columns of one row.

mod compiler;
mod ledger;

pub use compiler::{KERNEL_ARITY, KernelDecl};
pub use ledger::ResourceLedger;

use crate::config::{KernelScalars, LaunchGeometry};
use crate::device::{
    AccessMode, Completion, ComputeKernel, Device, DeviceBuffer, DeviceInfo, KernelArgs,
    LaunchError, Platform,
};
use crate::error::{BenchError, Result};
use crate::source::KernelSource;
use ledger::LedgerGuard;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Work-group limit reported by host devices.
pub const HOST_MAX_WORK_GROUP_SIZE: usize = 4096;

/// Local memory reported by host devices.
pub const HOST_LOCAL_MEM_BYTES: u64 = 65_536;

/// Failures to inject into a host device.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Fail the launch with this zero-based run index.
    pub fail_launch_on_run: Option<usize>,
    /// Make this run's completion arrive only after the delay.
    pub slow_run: Option<(usize, Duration)>,
    pub fail_upload: bool,
    pub fail_download: bool,
    /// Add an error of 10.0 to this many leading output elements.
    pub corrupt_outputs: usize,
}

/// Shape of the host platform.
#[derive(Debug, Clone)]
pub struct HostPlatformSpec {
    pub devices: usize,
    pub max_work_group_size: usize,
    pub faults: FaultPlan,
}

impl Default for HostPlatformSpec {
    fn default() -> Self {
        Self {
            devices: 1,
            max_work_group_size: HOST_MAX_WORK_GROUP_SIZE,
            faults: FaultPlan::default(),
        }
    }
}

/// The host platform.
#[derive(Debug)]
pub struct HostPlatform {
    spec: HostPlatformSpec,
    ledger: Rc<ResourceLedger>,
}

impl HostPlatform {
    pub fn new(spec: HostPlatformSpec) -> Self {
        Self { spec, ledger: ResourceLedger::new() }
    }

    /// The platforms visible to the host backend: exactly one.
    pub fn discover() -> Vec<Self> {
        vec![Self::new(HostPlatformSpec::default())]
    }

    /// Accounting shared by every object this platform creates.
    pub fn ledger(&self) -> Rc<ResourceLedger> {
        Rc::clone(&self.ledger)
    }
}

impl Platform for HostPlatform {
    type DeviceId = usize;
    type Device = HostDevice;

    fn name(&self) -> String {
        "matbench host".to_string()
    }

    fn device_ids(&self) -> Result<Vec<usize>> {
        Ok((0..self.spec.devices).collect())
    }

    fn open(&self, id: usize) -> Result<HostDevice> {
        let threads = std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1);
        let info = DeviceInfo {
            platform_name: self.name(),
            name: format!("Host CPU #{id}"),
            vendor: "matbench".to_string(),
            compute_units: threads,
            max_work_group_size: self.spec.max_work_group_size,
            // Unknown without querying the OS.
            global_mem_bytes: 0,
            local_mem_bytes: HOST_LOCAL_MEM_BYTES,
        };
        Ok(HostDevice {
            info,
            epoch: Instant::now(),
            faults: self.spec.faults.clone(),
            _queue: self.ledger.acquire("queue"),
            _context: self.ledger.acquire("context"),
            ledger: Rc::clone(&self.ledger),
        })
    }
}

/// An opened host device.
#[derive(Debug)]
pub struct HostDevice {
    info: DeviceInfo,
    epoch: Instant,
    faults: FaultPlan,
    ledger: Rc<ResourceLedger>,
    _queue: LedgerGuard,
    _context: LedgerGuard,
}

impl HostDevice {
    pub fn ledger(&self) -> Rc<ResourceLedger> {
        Rc::clone(&self.ledger)
    }
}

/// Host memory posing as a device buffer.
#[derive(Debug)]
pub struct HostBuffer {
    data: Rc<RefCell<Vec<f32>>>,
    mode: AccessMode,
    _guard: LedgerGuard,
}

impl DeviceBuffer for HostBuffer {
    fn len(&self) -> usize {
        self.data.borrow().len()
    }

    fn mode(&self) -> AccessMode {
        self.mode
    }
}

impl Device for HostDevice {
    type Buffer = HostBuffer;
    type Kernel = HostKernel;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn allocate(&self, len: usize, mode: AccessMode) -> Result<HostBuffer> {
        let bytes = len.checked_mul(size_of::<f32>()).ok_or_else(|| BenchError::Allocation {
            bytes: usize::MAX,
            reason: format!("{len} elements overflow"),
        })?;
        if len == 0 {
            return Err(BenchError::Allocation { bytes, reason: "zero-sized buffer".into() });
        }
        debug!(len, ?mode, "host buffer allocated");
        Ok(HostBuffer {
            data: Rc::new(RefCell::new(vec![0.0; len])),
            mode,
            _guard: self.ledger.acquire("buffer"),
        })
    }

    fn upload(&self, src: &[f32], dst: &mut HostBuffer) -> Result<()> {
        if self.faults.fail_upload {
            return Err(BenchError::upload("injected write failure"));
        }
        let mut data = dst.data.borrow_mut();
        if src.len() > data.len() {
            return Err(BenchError::upload(format!(
                "source ({}) exceeds buffer capacity ({})",
                src.len(),
                data.len()
            )));
        }
        data[..src.len()].copy_from_slice(src);
        Ok(())
    }

    fn download(&self, src: &HostBuffer, dst: &mut [f32]) -> Result<()> {
        if self.faults.fail_download {
            return Err(BenchError::download("injected read failure"));
        }
        let data = src.data.borrow();
        if dst.len() > data.len() {
            return Err(BenchError::download(format!(
                "destination ({}) exceeds buffer capacity ({})",
                dst.len(),
                data.len()
            )));
        }
        dst.copy_from_slice(&data[..dst.len()]);
        Ok(())
    }

    fn compile(&self, source: &KernelSource, entry_point: &str) -> Result<HostKernel> {
        let program = self.ledger.acquire("program");
        let file = source.path.display().to_string();
        let decl = compiler::check(&file, &source.text, entry_point).map_err(|log| {
            BenchError::CompileFailure { entry_point: entry_point.to_string(), log }
        })?;
        warn!(
            path = %file,
            entry_point,
            "host backend emulates {entry_point}; the kernel source is not executed and \
             timings measure the host, not a device"
        );
        debug!(entry_point, line = decl.line, "host kernel signature accepted");
        Ok(HostKernel {
            bound: None,
            epoch: self.epoch,
            faults: self.faults.clone(),
            max_work_group_size: self.info.max_work_group_size,
            launches: 0,
            _kernel: self.ledger.acquire("kernel"),
            _program: program,
        })
    }
}

#[derive(Debug)]
struct BoundArgs {
    a: Rc<RefCell<Vec<f32>>>,
    b: Rc<RefCell<Vec<f32>>>,
    c: Rc<RefCell<Vec<f32>>>,
    scalars: KernelScalars,
}

/// The host rendition of `matrix_mult`.
#[derive(Debug)]
pub struct HostKernel {
    bound: Option<BoundArgs>,
    epoch: Instant,
    faults: FaultPlan,
    max_work_group_size: usize,
    launches: usize,
    _kernel: LedgerGuard,
    _program: LedgerGuard,
}

impl ComputeKernel for HostKernel {
    type Buffer = HostBuffer;
    type Completion = HostCompletion;

    fn bind(&mut self, args: KernelArgs<'_, HostBuffer>) -> Result<()> {
        let expected = [
            (0u32, args.a, AccessMode::ReadOnly),
            (1, args.b, AccessMode::ReadOnly),
            (2, args.c, AccessMode::WriteOnly),
        ];
        for (index, buffer, mode) in expected {
            if buffer.mode() != mode {
                return Err(BenchError::KernelArgument {
                    index,
                    reason: format!("buffer is {:?}, kernel needs {mode:?}", buffer.mode()),
                });
            }
        }
        let s = args.scalars;
        for (index, value) in [(3u32, s.m), (4, s.n), (5, s.k), (6, s.n_works)] {
            if value <= 0 {
                return Err(BenchError::KernelArgument {
                    index,
                    reason: format!("value {value} must be positive"),
                });
            }
        }
        self.bound = Some(BoundArgs {
            a: Rc::clone(&args.a.data),
            b: Rc::clone(&args.b.data),
            c: Rc::clone(&args.c.data),
            scalars: s,
        });
        Ok(())
    }

    fn launch(
        &mut self,
        geometry: &LaunchGeometry,
    ) -> std::result::Result<HostCompletion, LaunchError> {
        let run = self.launches;
        self.launches += 1;

        if self.faults.fail_launch_on_run == Some(run) {
            return Err(LaunchError::Failed("injected launch failure".into()));
        }
        let bound = self
            .bound
            .as_ref()
            .ok_or_else(|| LaunchError::Failed("kernel arguments are not set".into()))?;
        if geometry.global.contains(&0) || geometry.local.contains(&0) {
            return Err(LaunchError::Failed(format!("invalid work size {geometry:?}")));
        }
        if !geometry.fits(self.max_work_group_size) {
            return Err(LaunchError::Failed(format!(
                "work-group size {} exceeds device limit {}",
                geometry.work_group_size(),
                self.max_work_group_size
            )));
        }

        let start_ns = self.epoch.elapsed().as_nanos() as u64;
        execute(bound, geometry)?;
        if self.faults.corrupt_outputs > 0 {
            let mut c = bound.c.borrow_mut();
            let n = self.faults.corrupt_outputs.min(c.len());
            c[..n].iter_mut().for_each(|v| *v += 10.0);
        }
        let end_ns = self.epoch.elapsed().as_nanos() as u64;

        let ready_at = match self.faults.slow_run {
            Some((slow, delay)) if slow == run => {
                warn!(run, ?delay, "host completion delayed");
                Some(Instant::now() + delay)
            }
            _ => None,
        };
        Ok(HostCompletion { start_ns, end_ns, ready_at })
    }
}

/// Run every work-item of the 2D index space.
fn execute(args: &BoundArgs, geometry: &LaunchGeometry) -> std::result::Result<(), LaunchError> {
    let KernelScalars { m, n, k, n_works } = args.scalars;
    let (m, n, k, n_works) = (m as usize, n as usize, k as usize, n_works as usize);

    let a = args.a.borrow();
    let b = args.b.borrow();
    let mut c = args
        .c
        .try_borrow_mut()
        .map_err(|_| LaunchError::Failed("output buffer aliases an input".into()))?;
    if a.len() < m * k || b.len() < k * n || c.len() < m * n {
        return Err(LaunchError::Failed("bound buffers smaller than m/n/k imply".into()));
    }

    for row in 0..geometry.global[0] {
        for group in 0..geometry.global[1] {
            for w in 0..n_works {
                let col = group * n_works + w;
                if row >= m || col >= n {
                    continue;
                }
                let mut sum = 0.0f32;
                for l in 0..k {
                    sum += a[row * k + l] * b[l * n + col];
                }
                c[row * n + col] = sum;
            }
        }
    }
    Ok(())
}

/// Completion of a host launch. Work is done at launch time; only an
/// injected delay can make `wait` block.
#[derive(Debug)]
pub struct HostCompletion {
    start_ns: u64,
    end_ns: u64,
    ready_at: Option<Instant>,
}

impl Completion for HostCompletion {
    fn wait(&self, timeout: Option<Duration>) -> std::result::Result<(), LaunchError> {
        let Some(ready_at) = self.ready_at else {
            return Ok(());
        };
        let remaining = ready_at.saturating_duration_since(Instant::now());
        match timeout {
            Some(limit) if limit < remaining => {
                std::thread::sleep(limit);
                Err(LaunchError::TimedOut(limit))
            }
            _ => {
                std::thread::sleep(remaining);
                Ok(())
            }
        }
    }

    fn timestamps(&self) -> std::result::Result<(u64, u64), LaunchError> {
        Ok((self.start_ns, self.end_ns))
    }
}
