use std::{future::pending, time::Duration};

use futures_lite::{stream, Stream};

use super::ConnectionCommand;

#[derive(Clone, Debug)]
pub(super) struct KeepAliveSettings {
    /// How often to send a keep alive ping
    pub(super) interval: Option<Duration>,

    /// How many pings can be sent without receiving a reply before
    /// the connection is considered dropped
    pub(super) retries: usize,
}

impl Default for KeepAliveSettings {
    fn default() -> Self {
        Self {
            interval: None,
            retries: 3,
        }
    }
}

enum KeepAliveState {
    Running,
    StartedKeepAlive,
    TimingOut { failure_count: usize },
}

impl KeepAliveSettings {
    /// A stream of pings, one per quiet interval.
    ///
    /// The actor restarts this whenever it hears from the server.  The stream
    /// ends once more than `retries` pings have gone unanswered.
    pub(super) fn run(&self) -> impl Stream<Item = ConnectionCommand> + Send + 'static {
        let settings = self.clone();

        stream::unfold(KeepAliveState::Running, move |mut state| {
            let interval = settings.interval;
            let retries = settings.retries;
            async move {
                match interval {
                    Some(duration) => futures_timer::Delay::new(duration).await,
                    None => pending::<()>().await,
                }

                state = match state {
                    KeepAliveState::Running => KeepAliveState::StartedKeepAlive,
                    KeepAliveState::StartedKeepAlive => {
                        KeepAliveState::TimingOut { failure_count: 1 }
                    }
                    KeepAliveState::TimingOut { failure_count } => KeepAliveState::TimingOut {
                        failure_count: failure_count + 1,
                    },
                };

                if state.failure_count() > retries {
                    // returning None aborts
                    return None;
                }

                Some((ConnectionCommand::Ping, state))
            }
        })
    }
}

impl KeepAliveState {
    fn failure_count(&self) -> usize {
        match self {
            KeepAliveState::Running | KeepAliveState::StartedKeepAlive => 0,
            KeepAliveState::TimingOut { failure_count } => *failure_count,
        }
    }
}
