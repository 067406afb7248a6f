// src/miner/backend/opencl.rs
//! OpenCL GPU backend
//!
//! The kernel in `sha256d.cl` hashes one nonce per work item starting from
//! the context's pre-rolled state and drops pre-filter hits into a 16-slot
//! output buffer (0 = empty). The host confirms every hit with the full
//! comparison before reporting it.
//!
//! Dispatches are pipelined over two output buffers. Each batch is queued
//! as a kernel run followed by a non-blocking read of its buffer; the next
//! batch is queued into the other buffer before the host waits on that
//! read, so the device computes batch N+1 while the host scans batch N.
//! A dirty buffer is cleared by a queued write ahead of its next kernel.

use super::{SearchBackend, SearchContext};
use crate::miner::work::Work;
use crate::utils::MinerError;
use ocl::{Buffer, Context, Device, Event, Kernel, Platform, Program, Queue, flags};

const KERNEL_SRC: &str = include_str!("sha256d.cl");

/// Slots in each output buffer
pub const OUTPUT_SLOTS: usize = 16;

/// Words in the constant context buffer
const CTX_WORDS: usize = 35;

static CLEAR: [u32; OUTPUT_SLOTS] = [0; OUTPUT_SLOTS];

/// A GPU device as found on the OpenCL platforms
#[derive(Clone, Debug)]
pub struct GpuDevice {
    /// Platform handle
    pub platform: Platform,
    /// Device handle
    pub device: Device,
    /// Platform name
    pub platform_name: String,
    /// Device name
    pub device_name: String,
}

/// Lists every GPU-class device on every platform, in platform order
///
/// CPU-class OpenCL devices are skipped; the CPU backends cover them.
pub fn list_gpus() -> Result<Vec<GpuDevice>, MinerError> {
    let mut gpus = Vec::new();
    for platform in Platform::list() {
        let platform_name = platform.name()?;
        let devices = match Device::list(platform, Some(flags::DEVICE_TYPE_GPU)) {
            Ok(devices) => devices,
            Err(e) => {
                log::debug!("No GPU devices on platform {}: {}", platform_name, e);
                continue;
            }
        };
        for device in devices {
            gpus.push(GpuDevice {
                platform,
                device,
                platform_name: platform_name.clone(),
                device_name: device.name()?,
            });
        }
    }
    Ok(gpus)
}

/// Search backend bound to one GPU
pub struct OpenClBackend {
    queue: Queue,
    kernel: Kernel,
    ctx_buffer: Buffer<u32>,
    outputs: [Buffer<u32>; 2],
    host: [[u32; OUTPUT_SLOTS]; 2],
    local_size: usize,
}

/// A queued kernel run and the read of its output buffer
struct Batch {
    base: u32,
    count: u32,
    slot: usize,
    read: Event,
}

impl OpenClBackend {
    /// Builds the program and allocates buffers on `gpu`
    ///
    /// Kernel compilation errors surface here, never during a search.
    pub fn new(gpu: &GpuDevice) -> Result<Self, MinerError> {
        let context = Context::builder()
            .platform(gpu.platform)
            .devices(gpu.device)
            .build()?;
        let program = Program::builder()
            .src(KERNEL_SRC)
            .devices(gpu.device)
            .build(&context)?;
        let queue = Queue::new(&context, gpu.device, None)?;
        let local_size = gpu.device.max_wg_size()?.clamp(1, 256);

        let ctx_buffer = Buffer::<u32>::builder()
            .queue(queue.clone())
            .flags(flags::MEM_READ_ONLY)
            .len(CTX_WORDS)
            .fill_val(0u32)
            .build()?;
        let output = || {
            Buffer::<u32>::builder()
                .queue(queue.clone())
                .flags(flags::MEM_READ_WRITE)
                .len(OUTPUT_SLOTS)
                .fill_val(0u32)
                .build()
        };
        let outputs = [output()?, output()?];

        let kernel = Kernel::builder()
            .program(&program)
            .name("search")
            .queue(queue.clone())
            .global_work_size(local_size)
            .local_work_size(local_size)
            .arg(&ctx_buffer)
            .arg(0u32)
            .arg(0u32)
            .arg(&outputs[0])
            .build()?;

        log::debug!(
            "OpenCL kernel built for {} ({}), work group size {}",
            gpu.device_name,
            gpu.platform_name,
            local_size
        );

        Ok(OpenClBackend {
            queue,
            kernel,
            ctx_buffer,
            outputs,
            host: [[0; OUTPUT_SLOTS]; 2],
            local_size,
        })
    }

    /// Nonces per kernel dispatch
    pub fn batch_size(&self) -> u64 {
        (self.local_size * self.local_size * 8) as u64
    }

    fn upload(&self, ctx: &SearchContext) -> Result<(), MinerError> {
        let mut words = [0u32; CTX_WORDS];
        words[..8].copy_from_slice(&ctx.midstate);
        words[8..16].copy_from_slice(&ctx.prerolled);
        words[16..32].copy_from_slice(&ctx.block2);
        words[32] = ctx.w16;
        words[33] = ctx.w17;
        words[34] = ctx.target_hi;
        self.ctx_buffer.write(&words[..]).enq()?;
        Ok(())
    }

    /// Queues `count` nonces from `base` into output buffer `slot`
    #[allow(unsafe_code)]
    fn launch(&mut self, base: u32, count: u32, slot: usize) -> Result<Batch, MinerError> {
        let global = (count as usize).div_ceil(self.local_size) * self.local_size;
        self.kernel.set_arg(1, base)?;
        self.kernel.set_arg(2, count)?;
        self.kernel.set_arg(3, &self.outputs[slot])?;

        let mut read = Event::empty();
        // SAFETY: the kernel only touches buffers owned by `self`. The read
        // lands in `self.host[slot]`, which is not looked at before `read`
        // completes, and `search` drains the queue before returning.
        unsafe {
            self.kernel.cmd().global_work_size(global).enq()?;
            self.outputs[slot]
                .read(&mut self.host[slot][..])
                .block(false)
                .enew(&mut read)
                .enq()?;
        }
        Ok(Batch {
            base,
            count,
            slot,
            read,
        })
    }

    /// Waits for `batch` and returns its confirmed solutions
    #[allow(unsafe_code)]
    fn collect(&self, ctx: &SearchContext, batch: &Batch) -> Result<Vec<u32>, MinerError> {
        batch.read.wait_for()?;
        let slots = self.host[batch.slot];

        if slots.iter().any(|n| *n != 0) {
            // SAFETY: `CLEAR` is immutable and lives for the whole program.
            // The write is ordered before the next kernel on this buffer.
            unsafe {
                self.outputs[batch.slot]
                    .write(&CLEAR[..])
                    .block(false)
                    .enq()?;
            }
        }

        let mut found: Vec<u32> = slots
            .into_iter()
            .filter(|n| *n != 0 && ctx.range.contains(*n) && ctx.confirm(*n))
            .collect();

        // The output encoding cannot carry nonce 0; check it here.
        if batch.base == 0 && ctx.range.contains(0) && ctx.confirm(0) {
            found.push(0);
        }
        Ok(found)
    }
}

impl SearchBackend for OpenClBackend {
    fn name(&self) -> &'static str {
        "opencl"
    }

    fn search(
        &mut self,
        work: &Work,
        ctx: &SearchContext,
        progress: &mut dyn FnMut(u64) -> bool,
    ) -> Option<u32> {
        if ctx.range.is_empty() {
            return None;
        }
        if let Err(e) = self.upload(ctx) {
            log::error!("OpenCL upload failed for block {}: {}", work.block_number, e);
            return None;
        }

        let batch = self.batch_size();
        let mut remaining = ctx.range.len();
        let mut base = ctx.range.first;
        let mut slot = 0;
        let mut in_flight: Option<Batch> = None;

        let outcome = loop {
            // Queue the following batch before scanning the current one.
            let next = if remaining > 0 {
                let count = remaining.min(batch) as u32;
                match self.launch(base, count, slot) {
                    Ok(queued) => {
                        remaining -= u64::from(count);
                        base = base.wrapping_add(count);
                        slot ^= 1;
                        Some(queued)
                    }
                    Err(e) => {
                        log::error!("OpenCL dispatch failed: {}", e);
                        break None;
                    }
                }
            } else {
                None
            };

            let Some(current) = std::mem::replace(&mut in_flight, next) else {
                if in_flight.is_none() {
                    break None;
                }
                continue;
            };

            let found = match self.collect(ctx, &current) {
                Ok(found) => found,
                Err(e) => {
                    log::error!("OpenCL readback failed: {}", e);
                    break None;
                }
            };
            let keep_going = progress(u64::from(current.count));
            if let Some(nonce) = found.into_iter().min() {
                break Some(nonce);
            }
            if !keep_going {
                break None;
            }
        };

        // Nothing may still be writing into the host buffers once we return.
        // A batch still in flight here is dropped unreported.
        if in_flight.take().is_some() {
            if let Err(e) = self.queue.finish() {
                log::error!("OpenCL queue drain failed: {}", e);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::backend::NonceRange;
    use crate::miner::backend::tests::{assert_cancels_after, run_fixture};
    use crate::miner::work::tests::FIXTURE_NONCE;

    #[test]
    fn finds_fixture_nonce_on_first_gpu() {
        let Some(gpu) = list_gpus().ok().and_then(|g| g.into_iter().next()) else {
            return;
        };
        let mut backend = OpenClBackend::new(&gpu).unwrap();
        let range = NonceRange::new(FIXTURE_NONCE - 1_000_000, FIXTURE_NONCE + 1000);
        let (found, _) = run_fixture(&mut backend, range);
        assert_eq!(found, Some(FIXTURE_NONCE));
    }

    #[test]
    fn stops_after_third_batch_on_first_gpu() {
        let Some(gpu) = list_gpus().ok().and_then(|g| g.into_iter().next()) else {
            return;
        };
        let mut backend = OpenClBackend::new(&gpu).unwrap();
        let batch = backend.batch_size();
        assert_cancels_after(&mut backend, 3, batch);
        // The queue was drained; the backend is reusable.
        let range = NonceRange::new(FIXTURE_NONCE - 1000, FIXTURE_NONCE + 1000);
        assert_eq!(run_fixture(&mut backend, range).0, Some(FIXTURE_NONCE));
    }

    #[test]
    fn exhausts_with_exact_count_on_first_gpu() {
        let Some(gpu) = list_gpus().ok().and_then(|g| g.into_iter().next()) else {
            return;
        };
        let mut backend = OpenClBackend::new(&gpu).unwrap();
        let range = NonceRange::new(FIXTURE_NONCE - 150_003, FIXTURE_NONCE - 1);
        let (found, reports) = run_fixture(&mut backend, range);
        assert_eq!(found, None);
        assert_eq!(reports.iter().sum::<u64>(), 150_003);
    }
}
