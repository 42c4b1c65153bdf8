use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use futures::executor::block_on;
use keystone_di::{Arguments, Component, Container, DynError, Metadata, Token};

#[derive(Debug, PartialEq)]
struct Config {
    url: String,
}

struct Logger {
    config: Arc<Config>,
    lines: Mutex<Vec<String>>,
}
impl Logger {
    fn log(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
impl Component for Logger {
    fn metadata() -> Metadata<Self> {
        Metadata::<Self>::new().param::<Arc<Config>>("CONFIG")
    }

    fn construct(args: &mut Arguments) -> Result<Self, DynError> {
        Ok(Logger {
            config: args.next()?,
            lines: Mutex::new(Vec::new()),
        })
    }
}

static HOOK_RUNS: AtomicUsize = AtomicUsize::new(0);

struct Service {
    logger: Arc<Logger>,
    initialized: bool,
}
impl Component for Service {
    fn metadata() -> Metadata<Self> {
        Metadata::<Self>::new()
            .param::<Arc<Logger>>(Token::of::<Logger>())
            .post_construct("init", |this| {
                this.logger.log("service initialized");
                this.initialized = true;
                HOOK_RUNS.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
    }

    fn construct(args: &mut Arguments) -> Result<Self, DynError> {
        Ok(Service {
            logger: args.next()?,
            initialized: false,
        })
    }
}

#[test]
fn config_logger_service() {
    let container = Container::new();
    container
        .bind("CONFIG")
        .to_value(Config {
            url: "x".to_string(),
        })
        .register()
        .unwrap();
    container.bind_type::<Logger>().to_self().unwrap().register().unwrap();
    container.bind_type::<Service>().to_self().unwrap().register().unwrap();
    container.validate().unwrap();

    let service = container.get::<Service>().unwrap();

    assert_eq!(
        *service.logger.config,
        Config {
            url: "x".to_string()
        }
    );
    assert!(service.initialized);
    assert_eq!(HOOK_RUNS.load(Ordering::SeqCst), 1);
    assert_eq!(
        *service.logger.lines.lock().unwrap(),
        vec!["service initialized".to_string()]
    );

    block_on(container.dispose()).unwrap();
}
