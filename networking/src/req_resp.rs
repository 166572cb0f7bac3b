use std::io;

use async_trait::async_trait;
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p::request_response::{
    Behaviour as RequestResponse, Codec, Config, Event, ProtocolSupport,
};

use crate::wire::RPC_PROTOCOL;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RpcProtocol(pub String);

impl AsRef<str> for RpcProtocol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque byte codec; framing is handled by the substream, payload encoding
/// by the wire layer (CBOR).
#[derive(Clone, Default)]
pub struct RpcCodec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest(pub Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse(pub Vec<u8>);

#[async_trait]
impl Codec for RpcCodec {
    type Protocol = RpcProtocol;
    type Request = RawRequest;
    type Response = RawResponse;

    async fn read_request<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
    ) -> io::Result<Self::Request>
    where
        T: AsyncRead + Unpin + Send,
    {
        let mut data = Vec::new();
        io.read_to_end(&mut data).await?;
        Ok(RawRequest(data))
    }

    async fn read_response<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
    ) -> io::Result<Self::Response>
    where
        T: AsyncRead + Unpin + Send,
    {
        let mut data = Vec::new();
        io.read_to_end(&mut data).await?;
        Ok(RawResponse(data))
    }

    async fn write_request<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
        RawRequest(data): Self::Request,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        io.write_all(&data).await?;
        io.close().await
    }

    async fn write_response<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
        RawResponse(data): Self::Response,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        io.write_all(&data).await?;
        io.close().await
    }
}

pub type ReqResp = RequestResponse<RpcCodec>;

pub type ReqRespEvent = Event<RawRequest, RawResponse>;

pub fn build() -> ReqResp {
    RequestResponse::with_codec(
        RpcCodec,
        [(RpcProtocol(RPC_PROTOCOL.to_string()), ProtocolSupport::Full)],
        Config::default(),
    )
}
