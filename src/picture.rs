//! The picture submission pipeline.
//!
//! A picture is decoded in three steps:
//!
//! - [`Driver::begin_picture`] assigns the next input slot of the session to the render target.
//! - [`Driver::render_picture`] accumulates bitstream data in the slot's buffer and stages codec
//!   parameters in the session's [`CodecHandler`][crate::codec::CodecHandler].
//! - [`Driver::end_picture`] submits the picture as one device transaction.
//!
//! Completion is observed by [`Driver::sync_surface`], which drains finished transactions in
//! submission order.

use crate::{
    buffer::BufferType,
    codec::References,
    context::Context,
    device::{QueueBuffer, QueueType},
    driver::{log_err, Driver},
    heap::ObjectHeap,
    raw::{VABufferID, VAContextID, VASurfaceID},
    surface::{InFlight, Surface, SurfaceStatus},
    Device, Error, Result, VAError,
};

impl<D: Device> Context<D> {
    /// Drops the picture that is currently being accumulated, if any.
    fn abandon_current(&mut self, surfaces: &mut ObjectHeap<Surface>) {
        let Some(id) = self.current.take() else {
            return;
        };
        if let Some(surface) = surfaces.get_mut(id) {
            log::warn!("abandoning picture for surface {id:#x} that was never submitted");
            surface.status = SurfaceStatus::Skipped;
            if let Some(slot) = surface.slot.and_then(|index| self.ring.get_mut(index)) {
                slot.release();
            }
        }
    }

    /// Waits for the oldest queued transaction and retires it.
    fn complete_oldest(&mut self, surfaces: &mut ObjectHeap<Surface>) -> Result<()> {
        let picture = self.device.dequeue_buffer(QueueType::Picture)?;
        let bitstream = self.device.dequeue_buffer(QueueType::Bitstream)?;

        if let Some(slot) = self.ring.get_mut(bitstream.index as usize) {
            slot.release();
        }

        let id = self.surfaces.get(picture.index as usize).copied();
        let Some(surface) = id.and_then(|id| surfaces.get_mut(id)) else {
            log::warn!("device returned unknown picture buffer {}", picture.index);
            return Ok(());
        };
        if let Some(in_flight) = surface.in_flight.take() {
            if in_flight.slot != bitstream.index as usize {
                log::warn!(
                    "picture buffer {} completed with bitstream buffer {}, submitted from slot {}",
                    picture.index,
                    bitstream.index,
                    in_flight.slot
                );
            }
        }
        surface.status = if picture.error || bitstream.error {
            log::warn!("device reported a decoding error for picture buffer {}", picture.index);
            SurfaceStatus::Skipped
        } else {
            SurfaceStatus::Ready
        };
        log::trace!(
            "picture buffer {} done, surface status {:?}",
            picture.index,
            surface.status
        );
        Ok(())
    }

    /// Retires transactions until `target` is no longer in flight.
    fn drain_until(
        &mut self,
        surfaces: &mut ObjectHeap<Surface>,
        target: VASurfaceID,
    ) -> Result<()> {
        while surfaces
            .get(target)
            .map_or(false, |surface| surface.in_flight.is_some())
        {
            self.complete_oldest(surfaces)?;
        }
        Ok(())
    }

    /// Gives up on every transaction of the session that is still in flight.
    fn forget_in_flight(&mut self, surfaces: &mut ObjectHeap<Surface>) {
        for index in 0..self.ring.len() {
            let Some(slot) = self.ring.get_mut(index).filter(|slot| slot.is_in_flight()) else {
                continue;
            };
            if let Some(surface) = slot.occupant().and_then(|id| surfaces.get_mut(id)) {
                surface.in_flight = None;
                surface.status = SurfaceStatus::Skipped;
            }
            slot.release();
        }
    }

    fn restart_queue(&mut self, queue: QueueType) {
        log_err("end_picture", self.device.stream_off(queue));
        log_err("end_picture", self.device.stream_on(queue));
    }

    /// Takes back the picture buffer of a transaction whose bitstream could not be queued.
    ///
    /// Only completed buffers can be dequeued, so the buffer is reclaimed by restarting the
    /// picture queue. Earlier transactions of the session are retired first, which leaves the
    /// orphaned buffer alone in the queue.
    fn retract_picture(&mut self, surfaces: &mut ObjectHeap<Surface>) {
        while self.ring.num_in_flight() != 0 {
            if let Err(e) = self.complete_oldest(surfaces) {
                log::error!("failed to retire earlier pictures: {e}");
                self.forget_in_flight(surfaces);
                self.restart_queue(QueueType::Bitstream);
                break;
            }
        }
        self.restart_queue(QueueType::Picture);
    }

    /// Attaches the staged controls to the slot's transaction and enqueues both of its buffers.
    ///
    /// Returns the number of bitstream bytes submitted.
    fn submit(
        &mut self,
        surfaces: &mut ObjectHeap<Surface>,
        slot_index: usize,
        capture_index: usize,
        capture_planes: u8,
    ) -> Result<usize> {
        let slot = self
            .ring
            .get_mut(slot_index)
            .ok_or(Error::from(VAError::ERROR_INVALID_SURFACE))?;
        let request = match &slot.request {
            Some(request) => {
                self.device.reinit_request(request)?;
                request
            }
            None => &*slot.request.insert(self.device.new_request()?),
        };

        let len = slot.offset;
        let controls = self.handler.encode_control_structure(len);
        self.device.set_controls(request, &controls)?;

        self.device.queue_buffer(&QueueBuffer {
            queue: QueueType::Picture,
            index: capture_index as u32,
            num_planes: capture_planes,
            bytes_used: 0,
            request: None,
        })?;

        let queued = self
            .device
            .queue_buffer(&QueueBuffer {
                queue: QueueType::Bitstream,
                index: slot_index as u32,
                num_planes: 1,
                bytes_used: len as u32,
                request: Some(request),
            })
            .and_then(|()| {
                let res = self.device.queue_request(request);
                if res.is_err() {
                    // Detaches the bitstream buffer from the request.
                    log_err("end_picture", self.device.reinit_request(request));
                }
                res
            });
        if let Err(e) = queued {
            log::error!("failed to queue bitstream for slot {slot_index}: {e}");
            self.retract_picture(surfaces);
            return Err(e);
        }

        slot.offset = 0;
        slot.in_flight = true;
        Ok(len)
    }
}

impl<D: Device> Driver<D> {
    /// Starts a new picture that will be decoded into `target`.
    ///
    /// `target` has to be one of the render targets the context was created with. If it is still
    /// in flight, or if the slot assigned to the new picture is still occupied by an earlier
    /// picture, this waits for that picture to be decoded first.
    pub fn begin_picture(&mut self, context_id: VAContextID, target: VASurfaceID) -> Result<()> {
        let ctx = self
            .contexts
            .get_mut(context_id)
            .ok_or(Error::from(VAError::ERROR_INVALID_CONTEXT))?;
        if !self.configs.contains(ctx.config) {
            return Err(Error::from(VAError::ERROR_INVALID_CONFIG));
        }
        if ctx.capture_index(target).is_none() || !self.surfaces.contains(target) {
            return Err(Error::from(VAError::ERROR_INVALID_SURFACE));
        }

        ctx.abandon_current(&mut self.surfaces);
        ctx.drain_until(&mut self.surfaces, target)?;

        let next = ctx.ring.next_index();
        if let Some(occupant) = ctx.ring.get(next).and_then(|slot| {
            slot.is_in_flight().then_some(slot.occupant()).flatten()
        }) {
            log::trace!("slot {next} still busy with surface {occupant:#x}, waiting");
            ctx.drain_until(&mut self.surfaces, occupant)?;
        }

        let index = ctx.ring.acquire(target);
        let surface = self
            .surfaces
            .get_mut(target)
            .ok_or(Error::from(VAError::ERROR_INVALID_SURFACE))?;
        surface.status = SurfaceStatus::Rendering;
        surface.slot = Some(index);
        surface.bitstream_len = 0;
        ctx.current = Some(target);
        ctx.handler.begin_frame();

        log::trace!(
            "context {context_id:#x}: picture {} for surface {target:#x} uses slot {index}",
            ctx.ring.counter().wrapping_sub(1),
        );
        Ok(())
    }

    /// Feeds buffers to the picture that is being accumulated.
    ///
    /// Slice data is appended to the picture's input slot; parameter buffers are staged for
    /// [`Driver::end_picture`]. Buffer types the session's codec does not use are skipped. An
    /// invalid buffer stops processing, but buffers before it stay applied.
    pub fn render_picture(&mut self, context_id: VAContextID, buffers: &[VABufferID]) -> Result<()> {
        let ctx = self
            .contexts
            .get_mut(context_id)
            .ok_or(Error::from(VAError::ERROR_INVALID_CONTEXT))?;
        if !self.configs.contains(ctx.config) {
            return Err(Error::from(VAError::ERROR_INVALID_CONFIG));
        }
        let (target, slot, capture) = ctx
            .current
            .and_then(|id| {
                let slot = self.surfaces.get(id)?.slot?;
                Some((id, slot, ctx.capture_index(id)?))
            })
            .ok_or(Error::from(VAError::ERROR_INVALID_SURFACE))?;

        for &buffer_id in buffers {
            let Some(buffer) = self.buffers.get(buffer_id) else {
                log::debug!("render_picture: invalid buffer {buffer_id:#x}");
                return Err(Error::from(VAError::ERROR_INVALID_BUFFER));
            };

            match buffer.ty {
                BufferType::SliceData => {
                    let dest = ctx
                        .device
                        .bitstream_buffer(slot)
                        .ok_or(Error::from(VAError::ERROR_OPERATION_FAILED))?;
                    ctx.ring.append(slot, dest, &buffer.data)?;
                }
                ty => {
                    let refs = References::new(&ctx.surfaces, capture as u32);
                    if !ctx.handler.apply_parameters(ty, &buffer.data, &refs)? {
                        log::trace!("ignoring {ty:?} buffer {buffer_id:#x}");
                    }
                }
            }
        }

        log::trace!(
            "surface {target:#x}: {} bytes of bitstream accumulated",
            ctx.ring.get(slot).map_or(0, |slot| slot.offset()),
        );
        Ok(())
    }

    /// Submits the picture that is being accumulated to the device.
    ///
    /// On success the picture is in flight until [`Driver::sync_surface`] observes its
    /// completion. If the device rejects the submission, the surface is marked
    /// [`SurfaceStatus::Skipped`]; the session stays usable for later pictures.
    pub fn end_picture(&mut self, context_id: VAContextID) -> Result<()> {
        let ctx = self
            .contexts
            .get_mut(context_id)
            .ok_or(Error::from(VAError::ERROR_INVALID_CONTEXT))?;
        if !self.configs.contains(ctx.config) {
            return Err(Error::from(VAError::ERROR_INVALID_CONFIG));
        }
        let target = ctx
            .current
            .take()
            .ok_or(Error::from(VAError::ERROR_INVALID_SURFACE))?;
        let capture = ctx
            .capture_index(target)
            .ok_or(Error::from(VAError::ERROR_INVALID_SURFACE))?;
        let slot = self
            .surfaces
            .get(target)
            .and_then(|surface| surface.slot)
            .ok_or(Error::from(VAError::ERROR_INVALID_SURFACE))?;

        let submitted = ctx.submit(
            &mut self.surfaces,
            slot,
            capture,
            self.options.capture_planes,
        );
        let surface = self
            .surfaces
            .get_mut(target)
            .ok_or(Error::from(VAError::ERROR_INVALID_SURFACE))?;
        match submitted {
            Ok(len) => {
                surface.bitstream_len = len;
                surface.in_flight = Some(InFlight {
                    context: context_id,
                    slot,
                });
                log::trace!("surface {target:#x}: submitted {len} bytes from slot {slot}");
                Ok(())
            }
            Err(e) => {
                log::error!("surface {target:#x}: submission failed: {e}");
                surface.status = SurfaceStatus::Skipped;
                if let Some(slot) = ctx.ring.get_mut(slot) {
                    slot.release();
                }
                Err(Error::from(VAError::ERROR_UNKNOWN))
            }
        }
    }

    /// Blocks until the picture last submitted for `surface_id` has been decoded.
    ///
    /// Earlier pictures of the same session are retired on the way. Returns immediately if the
    /// surface has nothing in flight.
    pub fn sync_surface(&mut self, surface_id: VASurfaceID) -> Result<()> {
        let surface = self
            .surfaces
            .get(surface_id)
            .ok_or(Error::from(VAError::ERROR_INVALID_SURFACE))?;
        let Some(in_flight) = surface.in_flight else {
            return Ok(());
        };
        let ctx = self
            .contexts
            .get_mut(in_flight.context)
            .ok_or(Error::from(VAError::ERROR_INVALID_CONTEXT))?;
        ctx.drain_until(&mut self.surfaces, surface_id)
    }
}
