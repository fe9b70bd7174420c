use tokio::sync::mpsc::Sender;

use crate::network::NetworkPackage;

/// A stub that sends requests to one named server through the network.
pub trait Client {
    fn from_server(server_id: String, net_tx: Sender<NetworkPackage>) -> Self;
}
