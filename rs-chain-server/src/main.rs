use std::path::PathBuf;
use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, middleware, put, web};
use log::{error, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;

use rs_chain_core::io::{list_chains, named_chain_path, normalize_folder};
use rs_chain_core::{ChainError, DEFAULT_LIMIT, MarkovChain};

/// Server settings, read from the environment.
///
/// - `RS_CHAIN_HOST` (default `127.0.0.1`)
/// - `RS_CHAIN_PORT` (default `5000`)
/// - `RS_CHAIN_DATA_DIR` (default `./data`), where `*.chain` files live
#[derive(Clone, Debug)]
struct ServerConfig {
	host: String,
	port: u16,
	data_dir: PathBuf,
}

impl ServerConfig {
	fn from_env() -> Result<Self, String> {
		let host = std::env::var("RS_CHAIN_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
		let port = match std::env::var("RS_CHAIN_PORT") {
			Ok(value) => value
				.parse::<u16>()
				.map_err(|_| format!("RS_CHAIN_PORT must be a port number, got {value:?}"))?,
			Err(_) => 5000,
		};
		let data_dir = normalize_folder(&std::env::var("RS_CHAIN_DATA_DIR").unwrap_or_else(|_| "./data".to_owned()));
		Ok(Self { host, port, data_dir })
	}
}

/// Query parameters for the `/v1/generate` endpoint
#[derive(Deserialize)]
struct GenerateParams {
	limit: Option<usize>,
	seed: Option<u64>,
}

#[derive(Deserialize)]
struct ModelQuery {
	names: Option<String>,
}

#[derive(Deserialize)]
struct SaveQuery {
	name: Option<String>,
}

struct SharedData {
	chain: MarkovChain,
}

/// Maps a chain failure onto the matching HTTP status.
fn error_response(err: ChainError) -> HttpResponse {
	match err {
		ChainError::Untrained | ChainError::InvalidArgument(_) => HttpResponse::BadRequest().body(err.to_string()),
		ChainError::Version { .. } | ChainError::Format(_) => HttpResponse::UnprocessableEntity().body(err.to_string()),
		ChainError::CorruptChain(_) | ChainError::Io(_) => {
			error!("{err}");
			HttpResponse::InternalServerError().body(err.to_string())
		}
	}
}

/// HTTP GET endpoint `/v1/generate`
///
/// Generates a sentence of at most `limit` tokens. A `seed` makes the result reproducible.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<Mutex<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let limit = query.limit.unwrap_or(DEFAULT_LIMIT);

	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Chain lock failed"),
	};

	let result = match query.seed {
		Some(seed) => shared_data.chain.generate_with_rng(limit, &mut StdRng::seed_from_u64(seed)),
		None => shared_data.chain.generate(limit),
	};

	match result {
		Ok(sentence) => HttpResponse::Ok().body(sentence),
		Err(e) => error_response(e),
	}
}

/// HTTP PUT endpoint `/v1/train`
///
/// Learns the request body, one sentence per line.
#[put("/v1/train")]
async fn put_train(data: web::Data<Mutex<SharedData>>, body: String) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Chain lock failed"),
	};
	let count = shared_data.chain.train(body.lines());
	HttpResponse::Ok().body(count.to_string())
}

#[get("/v1/stats")]
async fn get_stats(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Chain lock failed"),
	};
	HttpResponse::Ok().json(shared_data.chain.stats())
}

#[get("/v1/export")]
async fn get_export(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Chain lock failed"),
	};
	match shared_data.chain.serialize_to_string() {
		Ok(text) => HttpResponse::Ok().body(text),
		Err(e) => error_response(e),
	}
}

/// HTTP PUT endpoint `/v1/import`
///
/// Replaces the current chain with the base64 chain in the body.
#[put("/v1/import")]
async fn put_import(data: web::Data<Mutex<SharedData>>, body: String) -> impl Responder {
	let chain = match MarkovChain::deserialize_from_string(&body) {
		Ok(chain) => chain,
		Err(e) => return error_response(e),
	};
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Chain lock failed"),
	};
	shared_data.chain = chain;
	HttpResponse::Ok().body("Chain imported successfully")
}

#[get("/v1/models")]
async fn get_models(config: web::Data<ServerConfig>) -> impl Responder {
	match list_chains(&config.data_dir) {
		Ok(names) => HttpResponse::Ok().body(names.join("\n")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list models"),
	}
}

/// HTTP PUT endpoint `/v1/load_models?names=a,b`
///
/// Replaces the current chain with the merge of the named chain files.
#[put("/v1/load_models")]
async fn put_models(
	data: web::Data<Mutex<SharedData>>,
	config: web::Data<ServerConfig>,
	query: web::Query<ModelQuery>,
) -> impl Responder {
	let query_names = match &query.names {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty model name"),
	};

	let merged = MarkovChain::new();
	for name in query_names.split(',').map(str::trim).filter(|s| !s.is_empty()) {
		let path = match named_chain_path(&config.data_dir, name) {
			Ok(path) => path,
			Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
		};
		match MarkovChain::deserialize_from_file(&path) {
			Ok(partial) => merged.merge(&partial),
			Err(e) => return error_response(e),
		}
	}

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Chain lock failed"),
	};
	shared_data.chain = merged;
	info!("Loaded models: {query_names}");
	HttpResponse::Ok().body("Models loaded successfully")
}

/// HTTP PUT endpoint `/v1/save_model?name=`
///
/// Writes the current chain to `<data_dir>/<name>.chain`.
#[put("/v1/save_model")]
async fn put_save_model(
	data: web::Data<Mutex<SharedData>>,
	config: web::Data<ServerConfig>,
	query: web::Query<SaveQuery>,
) -> impl Responder {
	let path = match query.name.as_deref().map(|name| named_chain_path(&config.data_dir, name.trim())) {
		Some(Ok(path)) => path,
		Some(Err(e)) => return HttpResponse::BadRequest().body(e.to_string()),
		None => return HttpResponse::BadRequest().body("Missing model name"),
	};
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Chain lock failed"),
	};
	match shared_data.chain.serialize_to_file(&path) {
		Ok(()) => HttpResponse::Ok().body("Model saved successfully"),
		Err(e) => error_response(e),
	}
}

/// Main entry point for the server.
///
/// Starts with an empty chain wrapped in a `Mutex`, and serves the
/// training, generation and persistence endpoints.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config = ServerConfig::from_env().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
	info!("Serving on {}:{} with data directory {}", config.host, config.port, config.data_dir.display());

	let shared_chain = web::Data::new(Mutex::new(SharedData {
		chain: MarkovChain::new(),
	}));
	let shared_config = web::Data::new(config.clone());

	HttpServer::new(move || {
		App::new()
			.wrap(middleware::Logger::default())
			.wrap(Cors::permissive())
			.app_data(shared_chain.clone())
			.app_data(shared_config.clone())
			.service(get_generated)
			.service(put_train)
			.service(get_stats)
			.service(get_export)
			.service(put_import)
			.service(get_models)
			.service(put_models)
			.service(put_save_model)
	})
	.bind((config.host.as_str(), config.port))?
	.run()
	.await
}
