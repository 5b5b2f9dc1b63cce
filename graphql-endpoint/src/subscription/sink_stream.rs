//! Turn a push-style producer into a pull-style sequence.
//!
//! A single task owns the buffered values and the queue of waiting pulls.
//! Producer signals and consumer pulls only reach it as messages.

use std::collections::VecDeque;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

/// Releases whatever the producer holds. Runs at most once.
pub type Disposer = Box<dyn FnOnce() + Send + 'static>;

enum Signal<T, E> {
    Next(T),
    Complete,
    Error(E),
}

type Reply<T, E> = oneshot::Sender<Result<Option<T>, E>>;

enum Command<T, E> {
    Pull(Reply<T, E>),
    Cancel(oneshot::Sender<()>),
}

/// The producer's handle on a [`SinkStream`].
///
/// Only the first `complete` or `error` counts; every call after it is ignored.
pub struct Sink<T, E> {
    signals: mpsc::UnboundedSender<Signal<T, E>>,
}

impl<T, E> Clone for Sink<T, E> {
    fn clone(&self) -> Self {
        Self {
            signals: self.signals.clone(),
        }
    }
}

impl<T, E> Sink<T, E> {
    pub fn next(&self, value: T) {
        let _ = self.signals.send(Signal::Next(value));
    }

    pub fn complete(&self) {
        let _ = self.signals.send(Signal::Complete);
    }

    pub fn error(&self, error: E) {
        let _ = self.signals.send(Signal::Error(error));
    }

    /// Whether the consuming side is gone.
    pub fn is_closed(&self) -> bool {
        self.signals.is_closed()
    }
}

/// The consumer's view of a producer started with [`from_sink`].
///
/// Dropping it cancels the producer.
pub struct SinkStream<T, E> {
    commands: mpsc::UnboundedSender<Command<T, E>>,
}

/// Start a producer and return the sequence of the values it pushes.
///
/// `start` receives the [`Sink`] and returns the [`Disposer`] that stops the
/// producer. Must be called from within a tokio runtime.
pub fn from_sink<T, E, F>(start: F) -> SinkStream<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
    F: FnOnce(Sink<T, E>) -> Disposer,
{
    let (signals_tx, signals_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let disposer = start(Sink {
        signals: signals_tx,
    });

    let state = State {
        buffer: VecDeque::new(),
        pending: VecDeque::new(),
        closed: false,
        error: None,
        disposer: Some(disposer),
    };
    tokio::spawn(state.run(signals_rx, commands_rx));

    SinkStream {
        commands: commands_tx,
    }
}

impl<T, E> SinkStream<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Wait for the next value.
    ///
    /// `Ok(None)` once the producer completed or the sequence was cancelled.
    /// After an error every call returns that same error.
    pub async fn next(&self) -> Result<Option<T>, E> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Pull(reply)).is_err() {
            return Ok(None);
        }
        response.await.unwrap_or(Ok(None))
    }

    /// Stop the producer and resolve every waiting pull with `Ok(None)`.
    ///
    /// Calling it again does nothing.
    pub async fn cancel(&self) {
        let (ack, acked) = oneshot::channel();
        if self.commands.send(Command::Cancel(ack)).is_ok() {
            let _ = acked.await;
        }
    }

    /// The sequence as a [`Stream`], ending after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, E>> + Send + 'static {
        futures::stream::unfold(Some(self), |state| async move {
            let stream = state?;
            match stream.next().await {
                Ok(Some(value)) => Some((Ok(value), Some(stream))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
    }
}

struct State<T, E> {
    buffer: VecDeque<T>,
    pending: VecDeque<Reply<T, E>>,
    closed: bool,
    error: Option<E>,
    disposer: Option<Disposer>,
}

impl<T, E> State<T, E>
where
    E: Clone,
{
    async fn run(
        mut self,
        mut signals: mpsc::UnboundedReceiver<Signal<T, E>>,
        mut commands: mpsc::UnboundedReceiver<Command<T, E>>,
    ) {
        let mut producing = true;
        loop {
            tokio::select! {
                biased;

                signal = signals.recv(), if producing => match signal {
                    Some(Signal::Next(value)) => self.on_next(value),
                    Some(Signal::Complete) => self.on_complete(),
                    Some(Signal::Error(error)) => self.on_error(error),
                    None => {
                        tracing::trace!("every sink was dropped");
                        producing = false;
                        self.on_complete();
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Pull(reply)) => self.on_pull(reply),
                    Some(Command::Cancel(ack)) => {
                        if !self.closed {
                            tracing::debug!("subscription cancelled");
                        }
                        self.on_complete();
                        let _ = ack.send(());
                    }
                    None => {
                        self.on_complete();
                        break;
                    }
                },
            }
        }
    }

    fn on_next(&mut self, mut value: T) {
        if self.closed {
            return;
        }
        // a waiting pull may have given up in the meantime
        while let Some(reply) = self.pending.pop_front() {
            match reply.send(Ok(Some(value))) {
                Ok(()) => return,
                Err(Ok(Some(returned))) => value = returned,
                Err(_) => return,
            }
        }
        self.buffer.push_back(value);
    }

    fn on_complete(&mut self) {
        if self.closed {
            return;
        }
        tracing::trace!("subscription completed");
        self.closed = true;
        self.dispose();
        for reply in self.pending.drain(..) {
            let _ = reply.send(Ok(None));
        }
    }

    fn on_error(&mut self, error: E) {
        if self.closed {
            return;
        }
        tracing::debug!("subscription ended with an error");
        self.closed = true;
        self.dispose();
        for reply in self.pending.drain(..) {
            let _ = reply.send(Err(error.clone()));
        }
        self.error = Some(error);
    }

    fn on_pull(&mut self, reply: Reply<T, E>) {
        if let Some(value) = self.buffer.pop_front() {
            if let Err(Ok(Some(value))) = reply.send(Ok(Some(value))) {
                self.buffer.push_front(value);
            }
        } else if self.closed {
            let _ = reply.send(match &self.error {
                Some(error) => Err(error.clone()),
                None => Ok(None),
            });
        } else {
            self.pending.push_back(reply);
        }
    }

    fn dispose(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}
