use futures::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_serde::formats::*;
use tokio_serde::Framed;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::{Error, Result};

pub type Reader<I, O> =
    Framed<FramedRead<ReadHalf<TcpStream>, LengthDelimitedCodec>, O, I, Bincode<O, I>>;

pub type Writer<I, O> =
    Framed<FramedWrite<WriteHalf<TcpStream>, LengthDelimitedCodec>, O, I, Bincode<O, I>>;

pub struct Receiver<I, O> {
    reader: Reader<I, O>,
}

impl<I, O> Receiver<I, O>
where
    I: for<'de> Deserialize<'de> + Serialize,
    O: for<'de> Deserialize<'de> + Serialize,
    Reader<I, O>: TryStream<Ok = O, Error = std::io::Error> + Unpin,
{
    /// Receives the next frame, or `None` once the remote end has closed.
    pub async fn recv(&mut self) -> Result<Option<O>> {
        Ok(self.reader.try_next().await.map_err(Error::IO)?)
    }
}

pub struct Sender<I, O> {
    writer: Writer<I, O>,
}

impl<I, O> Sender<I, O>
where
    I: for<'de> Deserialize<'de> + Serialize,
    O: for<'de> Deserialize<'de> + Serialize,
    Writer<I, O>: Sink<I, Error = std::io::Error> + Unpin,
{
    pub async fn send(&mut self, item: I) -> Result<()> {
        Ok(self.writer.send(item).await.map_err(Error::IO)?)
    }
}

pub struct Channel<I, O> {
    socket: TcpStream,
    ghost: std::marker::PhantomData<(I, O)>,
}

impl<I, O> Channel<I, O>
where
    I: for<'de> Deserialize<'de> + Serialize,
    O: for<'de> Deserialize<'de> + Serialize,
{
    pub fn wrap(socket: TcpStream) -> Result<Channel<I, O>> {
        Ok(Channel { socket, ghost: Default::default() })
    }

    pub fn split(self) -> (Sender<I, O>, Receiver<I, O>) {
        let (reader, writer) = tokio::io::split(self.socket);

        let reader: FramedRead<ReadHalf<_>, LengthDelimitedCodec> =
            FramedRead::new(reader, LengthDelimitedCodec::new());
        let reader = Framed::new(reader, Bincode::default());

        let writer: FramedWrite<WriteHalf<_>, LengthDelimitedCodec> =
            FramedWrite::new(writer, LengthDelimitedCodec::new());
        let writer = Framed::new(writer, Bincode::default());

        (Sender { writer }, Receiver { reader })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::net::{TcpListener, TcpStream};

    #[actix_rt::test]
    async fn asymmetric_send_recv() {
        #[derive(Debug, PartialEq, Deserialize, Serialize)]
        pub struct Request(String);
        #[derive(Debug, PartialEq, Deserialize, Serialize)]
        pub struct Response(String);

        let address: SocketAddr = "127.0.0.1:20101".parse().expect("failed to construct address");
        let listener = TcpListener::bind(&address).await.unwrap();

        let handle_1 = tokio::spawn(async move {
            let (socket, _address) = listener.accept().await.unwrap();
            let channel: Channel<Response, Request> =
                Channel::wrap(socket).expect("failed to accept connection");
            let (mut sender, mut receiver) = channel.split();

            let request = receiver.recv().await.unwrap().unwrap();
            assert_eq!(request, Request(String::from("123")));

            sender.send(Response(String::from("456"))).await.unwrap();
        });

        let handle_2 = tokio::spawn(async move {
            let socket = TcpStream::connect(&address).await.unwrap();
            let channel: Channel<Request, Response> =
                Channel::wrap(socket).expect("failed to connect");
            let (mut sender, mut receiver) = channel.split();

            sender.send(Request(String::from("123"))).await.unwrap();

            let response = receiver.recv().await.unwrap().unwrap();
            assert_eq!(response, Response(String::from("456")));
        });

        handle_1.await.unwrap();
        handle_2.await.unwrap();
    }
}
