//! Collection and item routes for one entity, mounted at `/<path_segment>`.

use crate::cache::cache_control;
use crate::handlers::entity::{create, delete, delete_many, list, read, update, update_many};
use crate::model::Entity;
use crate::state::AppState;
use axum::{middleware, routing::get, Router};

pub fn entity_routes<E: Entity>(state: AppState) -> Router {
    let segment = E::schema().path_segment;
    Router::new()
        .route(
            &format!("/{}", segment),
            get(list::<E>)
                .post(create::<E>)
                .patch(update_many::<E>)
                .put(update_many::<E>)
                .delete(delete_many::<E>),
        )
        .route(
            &format!("/{}/:id", segment),
            get(read::<E>)
                .patch(update::<E>)
                .put(update::<E>)
                .delete(delete::<E>),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), cache_control))
        .with_state(state)
}
