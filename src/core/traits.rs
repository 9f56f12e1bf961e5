use crate::core::{errors::ExchangeError, types::StreamEvent};
use std::marker::PhantomData;
use tokio::sync::mpsc;

/// Consumer of a streaming session.
///
/// `on_message` is invoked exactly once per decoded inbound frame. Returning
/// an error does not stop the session; the error is routed to `on_error`.
/// A panic in `on_message` is caught and reported the same way.
pub trait MessageHandler<M>: Send + Sync + 'static {
    fn on_message(&self, message: M) -> Result<(), ExchangeError>;

    fn on_error(&self, error: ExchangeError);
}

/// Handler assembled from a pair of closures
pub struct FnHandler<M, F, E> {
    on_message: F,
    on_error: E,
    _message: PhantomData<fn(M)>,
}

/// Build a handler from a message closure and an error closure
pub fn handler_fn<M, F, E>(on_message: F, on_error: E) -> FnHandler<M, F, E>
where
    F: Fn(M) -> Result<(), ExchangeError> + Send + Sync + 'static,
    E: Fn(ExchangeError) + Send + Sync + 'static,
{
    FnHandler {
        on_message,
        on_error,
        _message: PhantomData,
    }
}

impl<M, F, E> MessageHandler<M> for FnHandler<M, F, E>
where
    M: 'static,
    F: Fn(M) -> Result<(), ExchangeError> + Send + Sync + 'static,
    E: Fn(ExchangeError) + Send + Sync + 'static,
{
    fn on_message(&self, message: M) -> Result<(), ExchangeError> {
        (self.on_message)(message)
    }

    fn on_error(&self, error: ExchangeError) {
        (self.on_error)(error);
    }
}

/// Handler that forwards everything into an unbounded queue
pub struct ChannelHandler<M> {
    tx: mpsc::UnboundedSender<StreamEvent<M>>,
}

/// Create a queue-backed handler and the receiver the caller drains
pub fn channel_handler<M: Send + 'static>(
) -> (ChannelHandler<M>, mpsc::UnboundedReceiver<StreamEvent<M>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelHandler { tx }, rx)
}

impl<M: Send + 'static> MessageHandler<M> for ChannelHandler<M> {
    fn on_message(&self, message: M) -> Result<(), ExchangeError> {
        self.tx
            .send(StreamEvent::Message(message))
            .map_err(|_| ExchangeError::Other("Message receiver dropped".to_string()))
    }

    fn on_error(&self, error: ExchangeError) {
        // receiver gone means nobody is listening for errors either
        let _ = self.tx.send(StreamEvent::Error(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_fn_handler_routes_calls() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen_c = seen.clone();
        let errors_c = errors.clone();

        let handler = handler_fn(
            move |m: u32| {
                seen_c.lock().unwrap().push(m);
                Ok(())
            },
            move |e| errors_c.lock().unwrap().push(e.to_string()),
        );

        handler.on_message(7).unwrap();
        handler.on_error(ExchangeError::NotConnected);

        assert_eq!(*seen.lock().unwrap(), vec![7]);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_channel_handler() {
        let (handler, mut rx) = channel_handler::<String>();
        handler.on_message("hello".to_string()).unwrap();
        handler.on_error(ExchangeError::NotConnected);

        assert!(matches!(rx.recv().await, Some(StreamEvent::Message(m)) if m == "hello"));
        assert!(matches!(
            rx.recv().await,
            Some(StreamEvent::Error(ExchangeError::NotConnected))
        ));
    }

    #[test]
    fn test_channel_handler_reports_dropped_receiver() {
        let (handler, rx) = channel_handler::<u8>();
        drop(rx);
        assert!(handler.on_message(1).is_err());
    }
}
