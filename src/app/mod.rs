use tokio::task::JoinSet;

use crate::config::Config;
use crate::config::rule::RuleDescriptor;

mod relay;
mod rule;
mod session;

#[cfg(test)]
mod testing;

#[derive(Debug)]
pub struct Engine {
    rules: Vec<RuleDescriptor>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            rules: config.rules,
        }
    }

    /// Run every rule concurrently until all of them have stopped or
    /// `shutdown` completes, whichever comes first.
    ///
    /// On shutdown every listener and every in-flight session is closed
    /// before this returns.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("starting {} redirect rules...", self.rules.len());

        let mut rules = JoinSet::new();
        for x in self.rules {
            rules.spawn(rule::run(x));
        }

        tokio::select! {
            () = wait_all(&mut rules) => info!("all redirect rules have stopped"),
            () = shutdown => info!("exiting..."),
        }

        rules.shutdown().await;
    }
}

async fn wait_all(rules: &mut JoinSet<()>) {
    while let Some(joined) = rules.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                error!("redirect rule panicked: {e}");
            }
        }
    }
}
