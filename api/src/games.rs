use log::{error, info};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;

use dice_server::models::game_record::GameSummary;
use dice_server::repository::create_game as allocate_game;

use crate::guards::AuthenticatedUser;
use crate::{ApiResponse, ApiState};

type GameResponse = (Status, Json<ApiResponse<GameSummary>>);

/// Opens an empty game under a fresh code. Players then connect to
/// `/ws/game/<id>/` on the game server.
#[post("/games")]
pub async fn create_game(user: AuthenticatedUser, state: &State<ApiState>) -> GameResponse {
    match allocate_game(state.store.as_ref()).await {
        Ok(game) => {
            info!("{} created game {}", user.0, game.id);
            (
                Status::Created,
                Json(ApiResponse::success("201: Created", GameSummary::from(&game))),
            )
        }
        Err(e) => {
            error!("could not create a game: {}", e);
            (
                Status::InternalServerError,
                Json(ApiResponse::failure("500: Internal Server Error")),
            )
        }
    }
}

#[get("/games/<id>")]
pub async fn get_game(id: &str, state: &State<ApiState>) -> GameResponse {
    match state.store.find_game(id).await {
        Ok(Some(game)) => (
            Status::Ok,
            Json(ApiResponse::success("200: Success", GameSummary::from(&game))),
        ),
        Ok(None) => (
            Status::NotFound,
            Json(ApiResponse::failure("404: Game not found")),
        ),
        Err(e) => {
            error!("could not load game {}: {}", id, e);
            (
                Status::InternalServerError,
                Json(ApiResponse::failure("500: Internal Server Error")),
            )
        }
    }
}
