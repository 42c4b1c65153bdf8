use std::sync::{Arc, Mutex};

use keystone_di::{
    Arguments, Component, Container, ContainerOptions, DynError, Metadata, PreDestroy, Scope,
    Token,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), DynError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let container = Container::with_options(ContainerOptions::named("app"));
    container.register_value(
        "config",
        AppConfig {
            url: "x".to_string(),
        },
    )?;
    container.bind_type::<Logger>().to_self()?.in_singleton_scope()?;
    container.bind_type::<Service>().to_self()?.register()?;

    container.validate()?;

    let service = container.get::<Service>()?;
    tracing::info!("Resolved service, logger is using '{}'", service.logger.config.url);
    tracing::info!("Logged lines: {:?}", service.logger.lines());

    let request = container.create_child(
        ContainerOptions::named("request").with_default_scope(Scope::Singleton),
    )?;
    request.register_value(
        "config",
        AppConfig {
            url: "y".to_string(),
        },
    )?;
    let scoped = request.get::<Service>()?;
    tracing::info!(
        "Service in '{}' shares the logger: {}",
        request.name(),
        Arc::ptr_eq(&scoped.logger, &service.logger)
    );

    println!("{:?}", container);
    println!("{:?}", container.instance_stats(Token::of::<Logger>()));

    futures::executor::block_on(container.dispose())?;
    Ok(())
}

#[derive(Debug)]
struct AppConfig {
    url: String,
}

#[derive(Debug)]
struct Logger {
    config: Arc<AppConfig>,
    lines: Mutex<Vec<String>>,
}
impl Logger {
    fn log(&self, line: impl Into<String>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.into());
        }
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }
}
impl Component for Logger {
    fn metadata() -> Metadata<Self> {
        Metadata::<Self>::new().param::<Arc<AppConfig>>("config").disposable()
    }

    fn construct(args: &mut Arguments) -> Result<Self, DynError> {
        Ok(Logger {
            config: args.next()?,
            lines: Mutex::new(Vec::new()),
        })
    }
}
impl PreDestroy for Logger {
    fn pre_destroy(&self) -> Result<(), DynError> {
        tracing::info!("Flushing {} logged line(s)", self.lines().len());
        Ok(())
    }
}

#[derive(Debug)]
struct Service {
    logger: Arc<Logger>,
}
impl Component for Service {
    fn metadata() -> Metadata<Self> {
        Metadata::<Self>::new()
            .param::<Arc<Logger>>(Token::of::<Logger>())
            .post_construct("announce", |this| {
                this.logger.log("service ready");
                Ok(())
            })
    }

    fn construct(args: &mut Arguments) -> Result<Self, DynError> {
        Ok(Service {
            logger: args.next()?,
        })
    }
}
