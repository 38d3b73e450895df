use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use session_store::{AuthType, Config, LoginType, NewSession, RedisCache, SessionError, SessionStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 会话缓存运维工具
#[derive(Debug, Parser)]
#[command(name = "session-admin", version)]
struct Cli {
    /// 覆盖 REDIS_URL
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 登录：检查设备数，写会话，同步索引，设置过期
    Login {
        #[arg(long)]
        user_id: u64,
        #[arg(long, value_enum, default_value_t = Channel::Web)]
        login_type: Channel,
        #[arg(long, value_enum, default_value_t = Method::Password)]
        auth_type: Method,
        #[arg(long)]
        role: Option<String>,
        /// 不指定时随机生成
        #[arg(long)]
        token: Option<String>,
    },
    /// 查看 token 对应的会话
    Show { token: String },
    /// 查看用户登录数量
    Count { user_id: String },
    /// 按登录渠道刷新过期时间
    Refresh { token: String },
    /// 注销单个 token
    Revoke {
        token: String,
        /// 只删除 token 键和绑定集合，不处理用户集合
        #[arg(long)]
        keep_index: bool,
    },
    /// 注销 token 所属用户的全部 token
    RevokeAll { token: String },
    /// 从绑定的索引中移除 token
    Unbind { token: String },
    /// 设置最大登录设备数
    SetMax { max: usize },
    Ping,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Channel {
    Web,
    App,
    Wx,
    Alipay,
}

impl From<Channel> for LoginType {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Web => LoginType::Web,
            Channel::App => LoginType::App,
            Channel::Wx => LoginType::Wx,
            Channel::Alipay => LoginType::Alipay,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    Password,
    Sms,
    ThirdParty,
}

impl From<Method> for AuthType {
    fn from(method: Method) -> Self {
        match method {
            Method::Password => AuthType::Password,
            Method::Sms => AuthType::Sms,
            Method::ThirdParty => AuthType::ThirdParty,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // 加载配置，命令行参数优先，.env 由 Config::from_env 读取
    let cli = Cli::parse();
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(_) if cli.redis_url.is_some() => Config::default(),
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = cli.redis_url.clone() {
        config.redis_url = url;
    }

    // 连接 Redis
    let cache = match RedisCache::connect(&config.redis_url).await {
        Ok(cache) => cache,
        Err(e) => {
            tracing::error!("Failed to connect to Redis: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let store = SessionStore::new(Arc::new(cache), &config);

    let result = run(&store, cli.command).await;
    store.close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(store: &SessionStore, command: Command) -> Result<(), SessionError> {
    match command {
        Command::Login {
            user_id,
            login_type,
            auth_type,
            role,
            token,
        } => {
            let token = token.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
            let new = NewSession {
                login_type: login_type.into(),
                auth_type: auth_type.into(),
                role,
            };
            let session = store.login(&token, user_id, &new).await?;
            print_json(&serde_json::json!({ "token": token, "session": session }));
        }
        Command::Show { token } => {
            let session = store.get_session_v2(&token).await?;
            let ttl = store.token_ttl(&token).await?;
            print_json(&serde_json::json!({
                "session": session,
                "ttl_secs": ttl.map(|t| t.as_secs()),
            }));
        }
        Command::Count { user_id } => {
            let count = store.user_token_count(&user_id).await?;
            let max = store.user_token_max_count().await;
            let tokens = store.user_tokens(&user_id).await?;
            print_json(&serde_json::json!({
                "count": count,
                "max": max,
                "over": count >= max,
                "tokens": tokens,
            }));
        }
        Command::Refresh { token } => {
            store.update_user_token_cache_expire(&token).await?;
            println!("ok");
        }
        Command::Revoke { token, keep_index } => {
            if keep_index {
                store.del_token_cache(&token).await?;
            } else {
                store.del_user_token_cache(&token).await?;
            }
            println!("ok");
        }
        Command::RevokeAll { token } => {
            let count = store.clean_user_token_cache(&token).await?;
            println!("revoked {}", count);
        }
        Command::Unbind { token } => {
            store.user_token_expired(&token).await?;
            println!("ok");
        }
        Command::SetMax { max } => {
            store.set_user_token_max_count(max).await?;
            println!("ok");
        }
        Command::Ping => {
            store.ping().await?;
            println!("PONG");
        }
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(out) => println!("{}", out),
        Err(e) => tracing::error!("Failed to serialize output: {}", e),
    }
}
