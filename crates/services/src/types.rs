// Copyright (c) 2024 Mike Tsao

//! Data types shared among services.

use crossbeam::channel::{Receiver, Sender};

/// Both halves of a crossbeam channel.
#[derive(Debug)]
pub struct CrossbeamChannel<T> {
    #[allow(missing_docs)]
    pub sender: Sender<T>,
    #[allow(missing_docs)]
    pub receiver: Receiver<T>,
}
impl<T> Default for CrossbeamChannel<T> {
    fn default() -> Self {
        let (sender, receiver) = crossbeam::channel::unbounded();
        Self { sender, receiver }
    }
}
impl<T> CrossbeamChannel<T> {
    /// A channel that holds at most `capacity` messages.
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam::channel::bounded(capacity);
        Self { sender, receiver }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProvidesService;

    #[derive(Debug, PartialEq)]
    enum Ping {
        Ping(u8),
    }

    struct Echo {
        inputs: CrossbeamChannel<Ping>,
    }
    impl ProvidesService<Ping, Ping> for Echo {
        fn sender(&self) -> &Sender<Ping> {
            &self.inputs.sender
        }

        fn receiver(&self) -> &Receiver<Ping> {
            &self.inputs.receiver
        }
    }

    #[test]
    fn inputs_reach_the_receiver() {
        let echo = Echo {
            inputs: CrossbeamChannel::bounded(1),
        };
        echo.send_input(Ping::Ping(1));
        // Full, so this one is dropped with a warning.
        echo.send_input(Ping::Ping(2));
        assert_eq!(echo.receiver().try_recv(), Ok(Ping::Ping(1)));
        assert!(echo.receiver().try_recv().is_err());
    }

    #[test]
    fn select_loop_receives() {
        let channel = CrossbeamChannel::default();
        channel.sender.send(7).unwrap();
        let mut sel = crossbeam::channel::Select::new();
        let index = sel.recv(&channel.receiver);
        let oper = sel.select();
        assert_eq!(oper.index(), index);
        assert_eq!(Echo::recv_operation(oper, &channel.receiver), Ok(7));
    }
}
