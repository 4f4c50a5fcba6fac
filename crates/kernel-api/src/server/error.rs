#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "server io error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn game_not_found(requested_game_id: &str, active_game_id: Option<&str>) -> Self {
        let details = active_game_id.map(|active| {
            format!("requested_game_id={requested_game_id} active_game_id={active}")
        });
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(
                ErrorCode::GameNotFound,
                "game_id does not match an active game",
                details,
            ),
        }
    }

    fn invalid_query(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::InvalidQuery, message, details),
        }
    }

    fn invalid_action(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::InvalidAction, message, details),
        }
    }

    fn busy(game_id: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            error: ApiError::new(
                ErrorCode::EngineBusy,
                "another action is still being processed",
                Some(format!("game_id={game_id}")),
            ),
        }
    }

    fn internal(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: ApiError::new(ErrorCode::InternalError, message, details),
        }
    }

    fn from_api_error(error: ApiError) -> Self {
        let status = match error.error_code {
            ErrorCode::GameNotFound => StatusCode::NOT_FOUND,
            ErrorCode::PhaseConflict | ErrorCode::EngineBusy => StatusCode::CONFLICT,
            ErrorCode::ConstraintViolation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InvalidAction
            | ErrorCode::InvalidQuery
            | ErrorCode::InvalidCellId
            | ErrorCode::InvalidCellType
            | ErrorCode::UnknownPersona
            | ErrorCode::ContractVersionUnsupported => StatusCode::BAD_REQUEST,
        };
        Self { status, error }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}
