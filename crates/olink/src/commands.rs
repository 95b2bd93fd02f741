//! Subcommand handlers

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use olink_geoip::{RangeIndex, iso_code_for_name};
use olink_tunnel::{
    ApiReply, Method, ParamValue, Params, SecureTunnel, TimeWindowKey, TunnelConfig, derive_path,
    obfuscate,
};
use tracing::{debug, info};

/// Resolve node addresses to country codes, one per line
pub async fn lookup(index: &RangeIndex, addresses: &[String]) -> Result<()> {
    index.warm_up();

    for address in addresses {
        let code = index.lookup(address).await;
        println!("{}\t{}", address, code.as_deref().unwrap_or("-"));
    }

    let stats = index.stats();
    debug!(
        "Index: {} IPv4, {} IPv6 ranges (loaded: {})",
        stats.ipv4_ranges, stats.ipv6_ranges, stats.loaded
    );
    Ok(())
}

/// Map country names to ISO codes, one per line
pub fn country(names: &[String]) {
    for name in names {
        println!("{}\t{}", name, iso_code_for_name(name).unwrap_or("-"));
    }
}

/// Options for one tunnelled request
pub struct SendOptions {
    pub url: String,
    pub method: String,
    pub params: Vec<String>,
    pub json: Option<String>,
    pub token: Option<String>,
    pub raw: bool,
}

/// Send one API request through the tunnel and print the reply
pub async fn send(config: TunnelConfig, options: SendOptions) -> Result<()> {
    let method = Method::from_bytes(options.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid method '{}'", options.method))?;
    let params = build_params(&options.params, options.json.as_deref())?;

    let tunnel = SecureTunnel::new(config)?;
    if let Some(token) = &options.token {
        tunnel.set_auth_token(token).context("Invalid user token")?;
    }

    info!("{} {} via {}", method, options.url, tunnel.config().base());
    let plaintext = tunnel.send(&method, &options.url, params).await?;

    if tunnel.offset().get() != 0 {
        info!("Clock offset in use: {}s", tunnel.offset().get());
    }

    if options.raw {
        println!("{}", plaintext);
        return Ok(());
    }

    let reply = ApiReply::parse(&plaintext)?;
    println!("{}", serde_json::to_string_pretty(reply.json())?);
    Ok(())
}

/// Print the path for one minute window
pub fn path(secret: &str, at: Option<&str>) -> Result<()> {
    let window = match at {
        Some(raw) => {
            let instant = DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("Invalid timestamp '{}'", raw))?;
            TimeWindowKey::at(instant.with_timezone(&Utc))
        }
        None => TimeWindowKey::now(),
    };

    let derived = derive_path(secret, &window);
    println!("window     {}", window);
    println!("path       {}", derived);
    println!("obfuscated {}", obfuscate(&derived.to_path()));
    Ok(())
}

/// Build request parameters from `key=value` pairs and an optional JSON object.
///
/// Values that parse as JSON keep their type (`page=2` is an integer,
/// `on=true` a boolean); anything else is a string. Pairs are applied after
/// the JSON object and override its keys.
pub fn build_params(pairs: &[String], json: Option<&str>) -> Result<Option<Params>> {
    let mut params = match json {
        Some(raw) => serde_json::from_str::<Params>(raw)
            .map_err(|e| anyhow!("--json must be a JSON object: {}", e))?,
        None => Params::new(),
    };

    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Parameter '{}' is not key=value", pair);
        };
        if key.is_empty() {
            bail!("Parameter '{}' has an empty key", pair);
        }
        let value = match serde_json::from_str::<serde_json::Value>(value) {
            Ok(parsed) => ParamValue::from(parsed),
            Err(_) => ParamValue::from(value),
        };
        params.insert(key.to_string(), value);
    }

    Ok((!params.is_empty()).then_some(params))
}
