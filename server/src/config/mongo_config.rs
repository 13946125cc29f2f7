use mongodb::{options::ClientOptions, Client};

pub async fn setup_mongo(mongo_uri: &str) -> mongodb::error::Result<Client> {
    let mut client_options = ClientOptions::parse(mongo_uri).await?;
    client_options.app_name = Some("dice-server".to_string());
    Client::with_options(client_options)
}
