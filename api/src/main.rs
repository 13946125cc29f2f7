#[macro_use]
extern crate rocket;

mod cors;
mod games;
mod guards;

use std::env;
use std::error::Error;
use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket};
use serde::Serialize;

use dice_server::config::mongo_config::setup_mongo;
use dice_server::repository::{GameStore, MongoGameRepository};

/// Shared by every route: where games live and how bearer tokens are checked.
pub struct ApiState {
    pub store: Arc<dyn GameStore>,
    pub jwt_secret: String,
}

// API response envelope
#[derive(Serialize, Debug)]
pub struct ApiResponse<T> {
    pub message: String,
    pub result: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, result: T) -> Self {
        Self {
            message: message.to_string(),
            result: Some(result),
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            message: message.to_string(),
            result: None,
        }
    }
}

#[catch(401)]
fn unauthorized() -> Json<ApiResponse<String>> {
    Json(ApiResponse::failure("401: Unauthorized"))
}

#[catch(404)]
fn not_found(req: &Request) -> Json<ApiResponse<String>> {
    Json(ApiResponse::failure(&format!(
        "404: '{}' route not found",
        req.uri()
    )))
}

pub fn build(state: ApiState) -> Rocket<Build> {
    rocket::build()
        .manage(state)
        .attach(cors::Cors)
        .mount(
            "/",
            routes![games::create_game, games::get_game, cors::all_options],
        )
        .register("/", catchers![unauthorized, not_found])
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mongo_uri =
        env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let database = env::var("DICE_DATABASE").unwrap_or_else(|_| "dice".to_string());
    let jwt_secret = env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set")?;

    let client = setup_mongo(&mongo_uri).await?;
    let state = ApiState {
        store: Arc::new(MongoGameRepository::new(&client, &database)),
        jwt_secret,
    };

    build(state).launch().await?;
    Ok(())
}
