//! Processor Tasks - interrupt event reading and command submission
//!
//! Two pumps connect an [`Adapter`] to the USB transport:
//!
//! * **Event processor**: reads the interrupt IN endpoint and feeds every
//!   transfer to [`Adapter::handle_event_buffer`]
//! * **Command processor**: drains the command channel filled by
//!   [`ChannelEncoder`](crate::ChannelEncoder), encodes each command and
//!   submits it as a control transfer
//!
//! [`run`] starts bring-up and drives both pumps concurrently.
//!
//! # Example
//!
//! ```rust,ignore
//! use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
//! use wireshock::{Adapter, AdapterOptions, ChannelEncoder, ChildList, HciCommand, processor};
//! use wireshock::constants::{COMMAND_QUEUE_DEPTH, MAX_REMOTE_DEVICES};
//!
//! static COMMANDS: Channel<CriticalSectionRawMutex, HciCommand, COMMAND_QUEUE_DEPTH> =
//!     Channel::new();
//!
//! async fn dongle(mut control: YourControlEndpoint, mut interrupt: YourInterruptEndpoint) {
//!     let adapter: Adapter<CriticalSectionRawMutex, _, ChildList<MAX_REMOTE_DEVICES>> =
//!         Adapter::new(
//!             ChannelEncoder::new(COMMANDS.sender()),
//!             ChildList::new(),
//!             AdapterOptions::default(),
//!         );
//!     processor::run(&adapter, COMMANDS.receiver(), &mut control, &mut interrupt).await;
//! }
//! ```

use crate::{
    Adapter, AdapterOptions, WireShockError,
    command::{CommandEncoder, HciCommand},
    constants::INTERRUPT_IN_BUFFER_LENGTH,
    registry::DeviceRegistry,
    transport::{InterruptPipe, UsbTransport},
};
use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Receiver};

/// Read the interrupt endpoint until the adapter is torn down
///
/// Read failures go through [`Adapter::handle_read_failure`]; the loop ends
/// early only if that asks to stop reading.
pub async fn event_processor<M, E, R, P>(adapter: &Adapter<M, E, R>, pipe: &mut P)
where
    M: RawMutex,
    E: CommandEncoder,
    R: DeviceRegistry,
    P: InterruptPipe,
{
    let mut read_buffer = [0u8; INTERRUPT_IN_BUFFER_LENGTH];

    while adapter.is_alive() {
        match pipe.read(&mut read_buffer).await {
            Ok(len) => {
                let len = len.min(read_buffer.len());
                adapter.handle_event_buffer(&read_buffer[..len]);
            }
            Err(failure) => {
                if !adapter.handle_read_failure(failure) {
                    break;
                }
            }
        }
    }

    debug!("[PROCESSOR] Event processor stopped");
}

/// Encode one command and send it through the control endpoint
///
/// # Errors
/// Returns the encoding or transport failure.
pub fn process_command<T: UsbTransport>(
    command: HciCommand,
    transport: &mut T,
    options: &AdapterOptions,
) -> Result<(), WireShockError> {
    let packet = command.encode(options)?;
    transport.send_control(&packet)?;
    trace!(
        "[PROCESSOR] Sent {:?}, {} bytes",
        command.opcode(),
        packet.len()
    );
    Ok(())
}

/// Drain the command channel forever
///
/// A failed submission is logged and dropped; the reply the controller never
/// sends simply leaves bring-up where it is.
pub async fn command_processor<M: RawMutex, T: UsbTransport, const N: usize>(
    commands: Receiver<'_, M, HciCommand, N>,
    transport: &mut T,
    options: &AdapterOptions,
) -> ! {
    loop {
        let command = commands.receive().await;
        if let Err(err) = process_command(command, transport, options) {
            error!(
                "[PROCESSOR] Failed to send {:?}: {:?}",
                command.opcode(),
                err
            );
        }
    }
}

/// Start bring-up and run both pumps until the adapter is torn down
pub async fn run<CM, M, E, R, T, P, const N: usize>(
    adapter: &Adapter<M, E, R>,
    commands: Receiver<'_, CM, HciCommand, N>,
    transport: &mut T,
    pipe: &mut P,
) where
    CM: RawMutex,
    M: RawMutex,
    E: CommandEncoder,
    R: DeviceRegistry,
    T: UsbTransport,
    P: InterruptPipe,
{
    if let Err(err) = adapter.start() {
        error!("[PROCESSOR] Bring-up did not start: {:?}", err);
    }

    let options = adapter.options();
    embassy_futures::select::select(
        command_processor(commands, transport, &options),
        event_processor(adapter, pipe),
    )
    .await;
}
