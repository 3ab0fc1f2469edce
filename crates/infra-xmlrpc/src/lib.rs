// Nimbus Infrastructure - XML-RPC Adapter
// Implements: RpcTransport (HTTP + basic auth), XML-RPC codec, XML document tree

pub mod codec;
mod transport;
pub mod xml;

pub use codec::{decode_response, encode_fault, encode_request, encode_response};
pub use transport::{HttpTransport, HttpTransportConfig};
pub use xml::XmlNode;
