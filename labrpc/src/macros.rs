#[macro_export]
macro_rules! service {
    () => {
        compile_error!("empty service is not allowed");
    };
    (
        $(#[$service_attr:meta])*
        service $svc_name:ident {
            $(
                $(#[$method_attr:meta])*
                fn $method_name:ident($($arg_id:ident: $arg_ty:ty),*) -> $output:ty;
            )*
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$service_attr])*
        pub mod $svc_name {
            use super::*;

            use $crate::network::NetworkPackage;
            use $crate::{server, client};

            use std::sync::Arc;
            use $crate::tokio::sync::mpsc::{self, Sender, Receiver};
            use $crate::serde_json;
            use $crate::serde::{Serialize, Deserialize};
            use $crate::anyhow::{Result, anyhow};
            use $crate::async_trait;
            use $crate::log::{error, trace, warn};


            #[derive(Debug, Deserialize, Serialize)]
            pub enum Request {
                $(
                    #[allow(non_camel_case_types)]
                    $method_name {  $($arg_id : $arg_ty),* }
                ),*
            }

            mod response {
                use super::*;
                $(
                    #[derive(Deserialize, Serialize)]
                    #[allow(non_camel_case_types)]
                    pub struct $method_name {
                        pub data: $output
                    }
                )*
            }

            /// Handlers run concurrently, so the service is shared rather than borrowed mutably.
            #[async_trait]
            pub trait Service: Send + Sync + 'static {
                $(
                    $(#[$method_attr])*
                    async fn $method_name(&self, $($arg_id : $arg_ty),* ) -> Result<$output>;
                )*
            }

            #[derive(Debug, Clone)]
            pub struct Client {
                server_id: String,
                tx: Sender<NetworkPackage>,
            }

            impl Client {

                $(
                    pub async fn $method_name(&self, $($arg_id : $arg_ty),* ) -> Result<$output> {
                        let req = Request::$method_name {
                            $($arg_id),*
                        };
                        let resp = self.call(serde_json::to_string(&req)?).await?;
                        let resp: response::$method_name = serde_json::from_str(&resp)?;
                        Ok(resp.data)
                    }
                )*

                /// Send a raw request. Fails if either the request or its reply was lost.
                pub async fn call(&self, req: String) -> Result<String> {
                    let (tx, mut rx) = mpsc::channel(1);
                    self.tx.send(NetworkPackage{to: self.server_id.clone(), reply: tx, data: req.clone()}).await?;
                    if let Some(resp) = rx.recv().await {
                        trace!("req: {}, resp: {}", req, &resp);
                        Ok(resp)
                    } else {
                        Err(anyhow!("unable to receive from server"))
                    }
                }
            }

            impl client::Client for Client {
                fn from_server(server_id: String, net_tx: Sender<NetworkPackage>) -> Self {
                    Self {
                        server_id,
                        tx: net_tx,
                    }
                }
            }

            async fn dispatch<T: Service>(svc: &T, req: Request, reply: Sender<String>) -> Result<()> {
                let resp = match req {
                    $(
                        Request::$method_name { $($arg_id),* } => {
                            let data = svc.$method_name($($arg_id),* ).await?;
                            serde_json::to_string(&response::$method_name { data })?
                        }
                    )*
                };
                trace!("handle send: {}", &resp);
                reply.send(resp).await?;
                Ok(())
            }

            #[derive(Debug)]
            pub struct Server<T: Service> {
                svc: Arc<T>,
                tx: Sender<NetworkPackage>,
                rx: Receiver<NetworkPackage>,
            }

            #[async_trait]
            impl<T: Service> server::Server for Server<T> {
                type Service = T;

                fn from_service(svc: Self::Service) -> Self {
                    let (tx, rx) = mpsc::channel(100);
                    Self {svc: Arc::new(svc), tx, rx}
                }

                fn client_chan(&self) -> Sender<NetworkPackage> {
                    self.tx.clone()
                }

                async fn handle(&mut self) -> Result<()> {
                    let NetworkPackage { reply, data, .. } = self
                        .rx
                        .recv()
                        .await
                        .ok_or_else(|| anyhow!("expected sender"))?;
                    trace!("handle recv: {}", &data);
                    let req: Request = match serde_json::from_str(&data) {
                        Ok(req) => req,
                        Err(e) => {
                            warn!("malformed request dropped: {}", e);
                            return Ok(());
                        }
                    };
                    let svc = self.svc.clone();
                    $crate::tokio::spawn(async move {
                        if let Err(e) = dispatch(&*svc, req, reply).await {
                            error!("request failed: {}", e);
                        }
                    });
                    Ok(())
                }
            }
        }
    };
}
